mod commands;
pub mod config;
pub mod engine;
pub mod report;

use std::error::Error;

use clap::*;
use commands::{
    dialects::Dialects, generate::Generate, init::Initialize, prompt::Prompt,
};

#[derive(Parser)]
#[command(name = "nl2sql", bin_name = "nl2sql")]
enum Command {
    Generate(Generate),
    Prompt(Prompt),
    Dialects(Dialects),
    Init(Initialize),
}

fn main() -> Result<(), Box<dyn Error>> {
    let command = Command::parse();
    match command {
        Command::Generate(args) => args.run(),
        Command::Prompt(args) => args.run(),
        Command::Dialects(args) => args.run(),
        Command::Init(args) => args.run(),
    }
}
