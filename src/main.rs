#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

mod application;
mod configuration;
mod domain;
mod infrastructure;

use std::env;
use std::process;

use anyhow::Error;
use anyhow::Result;
use owo_colors::OwoColorize;
use owo_colors::Stream;

use crate::application::cli;
use crate::application::cli::Run;
use crate::application::watch;

fn handle_error(err: Error) {
    let banner = format!(
        "Oh no! sessionwatch has failed with the following app version and error.\n\nVersion: {}\nError: {}",
        env!("CARGO_PKG_VERSION"),
        err
    );
    eprintln!(
        "{}",
        banner.if_supports_color(Stream::Stderr, |text| return text.red())
    );

    let backtrace = err.backtrace();
    if backtrace.to_string() == "disabled backtrace" {
        let args = env::args().collect::<Vec<String>>().join(" ");
        eprintln!("\nRunning the following can help explain further what the issue is:");
        eprintln!("\nRUST_LOG=sessionwatch RUST_BACKTRACE=1 {args}");
    } else {
        eprintln!("\n{}", backtrace);
    }
}

async fn run() -> Result<i32> {
    if cli::parse().await? == Run::Done {
        return Ok(0);
    }

    let snapshot = watch::start().await?;
    if snapshot.lifecycle.is_failure() {
        return Ok(1);
    }

    return Ok(0);
}

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    let debug_log_dir = env::var("SESSIONWATCH_LOG_DIR").unwrap_or_else(|_| {
        return cli::log_path()
            .parent()
            .map(|dir| return dir.to_string_lossy().to_string())
            .unwrap_or_else(|| return ".".to_string());
    });

    let file_appender = tracing_appender::rolling::never(debug_log_dir, "debug.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    if env::var("RUST_LOG")
        .unwrap_or_else(|_| return "".to_string())
        .contains("sessionwatch")
    {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(writer)
            .init();
    }

    let code = match run().await {
        Ok(code) => code,
        Err(err) => {
            handle_error(err);
            1
        }
    };

    // process::exit skips destructors, flush the log writer first.
    drop(_guard);
    process::exit(code);
}
