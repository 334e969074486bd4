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
    const DISPLAY_ENVS: [&str; 15] = [
        "RUST_LOG",
        "SPG_HOST",
        "SPG_PORT",
        "SPG_DATABASE_URL",
        "SPG_RUN_MODE",
        "SPG_SESSION_TTL_HOURS",
        "SPG_WEBHOOK_SIGNATURE_HEADER",
        "SPG_WEBHOOK_JWT_PUBLIC_KEY",
        "SPG_SKIP_WEBHOOK_SIGNATURE",
        "SPG_ADMIN_USERNAME",
        "IPAY_API_BASE",
        "IPAY_TOKEN_URL",
        "IPAY_RETURN_URL",
        "IPAY_CALLBACK_URL",
        "WHATSAPP_PHONE_NUMBER_ID",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
