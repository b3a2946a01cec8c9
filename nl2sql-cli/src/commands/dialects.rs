use std::error::Error;

use clap::Parser;
use nl2sql_core::dialect::SqlDialect;

#[derive(Parser, Debug, Clone)]
#[command(about = "List the supported SQL dialects")]
#[must_use]
pub struct Dialects {}

impl Dialects {
    pub fn run(self) -> Result<(), Box<dyn Error>> {
        for dialect in SqlDialect::ALL {
            match *dialect == SqlDialect::default() {
                true => println!("{dialect} (default)"),
                false => println!("{dialect}"),
            }
        }
        Ok(())
    }
}
