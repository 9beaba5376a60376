// File: main.rs
// License: Apache v2.0

use clap::Parser;
use log::*;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use ppf_scene::{ExportedScene, ProgramArgs};
use std::process::ExitCode;

fn setup() -> Result<(), Box<dyn std::error::Error>> {
    let pattern = "[{d(%Y-%m-%d %H:%M:%S)}] {m}{n}";
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info))?;
    log4rs::init_config(config)?;
    info!("{}", std::env::args().collect::<Vec<_>>().join(" "));
    Ok(())
}

fn main() -> ExitCode {
    let program_args = ProgramArgs::parse();
    if let Err(err) = setup() {
        eprintln!("failed to initialize logging: {}", err);
        return ExitCode::FAILURE;
    }
    if program_args.path.is_empty() {
        error!("--path is required");
        return ExitCode::FAILURE;
    }
    info!("loading {}", program_args.path);
    match ExportedScene::load(&program_args.path) {
        Ok(scene) => {
            scene.report();
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
