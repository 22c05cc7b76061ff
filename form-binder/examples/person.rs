//! Person form example
//!
//! Walks a small registration form through a typical lifecycle:
//! - programmatic edits that leave untouched fields unvalidated
//! - a visited field that gets validated as the user types
//! - an asynchronous uniqueness check
//! - a submit rejected by the server, then a successful one
//!
//! Run with `cargo run -p form-binder --example person`.

use std::time::Duration;

use log::LevelFilter;
use serde_json::json;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use form_binder::prelude::*;

fn registration() -> Model {
    Model::object("Registration")
        .field(
            "username",
            Model::string()
                .validator(Required::new("Username is required"))
                .validator(MinLength::new(3, "Username must be at least 3 characters"))
                .validator(AsyncRule::new("Username is taken", |value: Value| async move {
                    // Simulated directory lookup.
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    value != "admin"
                })),
        )
        .field(
            "email",
            Model::string()
                .validator(Required::new("Email is required"))
                .validator(Email::new("Please enter a valid email")),
        )
        .field("terms", Model::boolean().validator(Checked::new("You must accept the terms")))
}

async fn save(value: Value) -> Result<Option<Value>, EndpointError> {
    if value["email"] == "taken@example.com" {
        return Err(EndpointError::from_body(
            r#"{"validationErrorData": [{
                "parameterName": "registration",
                "message": "Object of type 'Registration' has invalid property 'email' with value 'taken@example.com', validation error: 'Email is already registered'"
            }]}"#,
        ));
    }
    Ok(Some(value))
}

fn print_errors(binder: &Binder) {
    for error in binder.errors() {
        println!("  {}", error);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), BinderError> {
    let _ = TermLogger::init(
        LevelFilter::Debug,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );

    let config = BinderConfig::new().on_change(|old| log::info!("Form changed (was {})", old));
    let binder = Binder::new(registration(), config);
    let root = binder.root();
    let username = root.field("username")?;
    let email = root.field("email")?;
    let terms = root.field("terms")?;

    // Programmatic edits do not validate untouched fields.
    username.set_value(json!("admin"));
    println!("dirty after edit: {}", binder.dirty());

    // The user leaves the username field.
    username.set_visited(true);
    username.validate().await;
    println!("username errors:");
    print_errors(&binder);

    username.set_value(json!("jane"));
    username.validate().await;
    println!("username invalid after fix: {}", username.invalid());

    email.set_value(json!("taken@example.com"));
    terms.set_value(json!(true));
    binder.validate().await;

    match binder.submit_to(save).await {
        Ok(_) => println!("saved"),
        Err(err) => {
            println!("submit failed: {}", err);
            if let Some(errors) = err.validation_errors() {
                for error in errors {
                    println!("  {}", error);
                }
            }
        }
    }

    email.set_value(json!("jane@example.com"));
    binder.validate().await;
    let saved = binder.submit_to(save).await?;
    println!("saved: {}", saved.unwrap_or_default());
    println!("dirty after submit: {}", binder.dirty());

    Ok(())
}
