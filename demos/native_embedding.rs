//! Embedding the engine without a script: commands defined as Rust
//! closures through `NativeActions`.
//!
//! Run with: `cargo run --example native_embedding -- greet world`

use chore_core::{
    ArgSpec, CliSpec, CommandSpec, FlagSpec, NativeActions, Registry, Value,
};
use chore_engine::{Engine, Outcome};

fn main() -> std::process::ExitCode {
    let mut actions = NativeActions::new();
    let greet = actions.register(|ctx| {
        let name = ctx.arg("name").unwrap_or("there");
        let shout = matches!(ctx.flag("shout"), Some(Value::Bool(true)));
        let greeting = format!("hello {name}");
        if shout {
            println!("{}", greeting.to_uppercase());
        } else {
            println!("{greeting}");
        }
        Ok(Value::Bool(true))
    });

    let mut registry = Registry::new();
    registry
        .set_cli(CliSpec::new("embedded", "a natively-embedded chore CLI"))
        .expect("first cli registration");
    registry
        .add_command(
            CommandSpec::new("greet")
                .with_usage("print a greeting")
                .with_args(ArgSpec::from_names(["name"]).expect("valid args"))
                .with_flag(FlagSpec::boolean("shout").with_usage("print in caps"))
                .with_action(greet),
        )
        .expect("valid command");

    let engine = Engine::new(registry.freeze());
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let outcome = engine.run(&argv, &actions);
    match &outcome {
        Outcome::Success(_) => {}
        Outcome::Help(text) => print!("{text}"),
        Outcome::Usage { error, help } => {
            eprintln!("error: {error}");
            eprint!("{help}");
        }
        Outcome::Failure(error) => eprintln!("error: {error}"),
    }
    std::process::ExitCode::from(outcome.exit_code() as u8)
}
