use std::io::{self, IsTerminal, Write};

use async_trait::async_trait;

use super::error::AuthError;

const TWO_FA_CODE_LENGTH: usize = 6;

/// Source of the one-time code used to answer a second-factor challenge.
#[async_trait]
pub trait CodePrompt: Send + Sync {
    async fn second_factor_code(&self) -> Result<String, AuthError>;
}

/// Reads the code from the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

#[async_trait]
impl CodePrompt for StdinPrompt {
    async fn second_factor_code(&self) -> Result<String, AuthError> {
        // Scheduled runs have no one to answer; fail instead of blocking.
        if !io::stdin().is_terminal() {
            return Err(AuthError::TwoFactorFailed(
                "a verification code is required but stdin is not a terminal; \
                 run ringdl interactively once to refresh the token cache"
                    .into(),
            ));
        }

        let code = tokio::task::spawn_blocking(|| {
            print!("Please enter the 2FA code sent to your phone: ");
            io::stdout().flush()?;
            let mut code = String::new();
            io::stdin().read_line(&mut code)?;
            Ok::<String, io::Error>(code.trim().to_string())
        })
        .await
        .map_err(|e| AuthError::TwoFactorFailed(format!("prompt task failed: {}", e)))??;

        Ok(code)
    }
}

/// Check the shape of a one-time code. Ring has the final word; a code that
/// fails here is still submitted.
pub fn validate_code(code: &str) -> Result<(), AuthError> {
    if code.len() != TWO_FA_CODE_LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(AuthError::TwoFactorFailed(format!(
            "code must be exactly {} digits",
            TWO_FA_CODE_LENGTH
        )));
    }
    Ok(())
}
