use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 18] = [
        "RUST_LOG",
        "CPG_ENVIRONMENT",
        "CPG_HOST",
        "CPG_PORT",
        "CPG_DATABASE_URL",
        "CPG_BACKEND_URL",
        "CPG_FRONTEND_URL",
        "CPG_SUCCESS_CALLBACK_URL",
        "CPG_FAILURE_CALLBACK_URL",
        "CPG_SUCCESS_REDIRECT_URL",
        "CPG_FAILURE_REDIRECT_URL",
        "CPG_GATEWAY_PRODUCT_INFO",
        "CPG_GATEWAY_IP_WHITELIST",
        "CPG_DEDUP_TTL_SECS",
        "CPG_PENDING_TXN_TTL_HOURS",
        "CPG_STORAGE_TIMEOUT_MS",
        "CPG_USE_X_FORWARDED_FOR",
        "CPG_USE_FORWARDED",
    ];

    const SECRET_ENVS: [&str; 3] = ["CPG_GATEWAY_MERCHANT_KEY", "CPG_GATEWAY_SALT", "CPG_JWT_SECRET"];

    println!("Current environment values:");
    for name in DISPLAY_ENVS {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    }
    println!("Secrets (values are never printed):");
    for name in SECRET_ENVS {
        let state = match env::var(name) {
            Ok(s) if !s.trim().is_empty() => "Set",
            Ok(_) => "Empty",
            Err(_) => "Not set",
        };
        println!("  {name:<35} {state:<15}");
    }
}
