use std::future::Future;

use url::Url;

use super::{AuthError, CredentialManager, TokenResponse};

/// Execute the manual copy/paste authorization flow.
///
/// The authorization URL is handed to `notify_authorization_url`; `read_input`
/// then supplies either the bare code or the full redirect URL the browser
/// landed on.
pub async fn run_manual_flow<Notify, Input, Fut>(
    manager: &CredentialManager,
    redirect_uri: &str,
    notify_authorization_url: Notify,
    mut read_input: Input,
) -> Result<TokenResponse, AuthError>
where
    Notify: Fn(&Url) -> Result<(), AuthError>,
    Input: FnMut() -> Fut,
    Fut: Future<Output = Result<String, AuthError>>,
{
    let auth_url = manager.build_authorization_url(redirect_uri);
    notify_authorization_url(&auth_url)?;

    let raw = read_input().await?;
    let code = parse_authorization_input(raw.trim())?;
    manager.exchange(&code).await
}

/// Extract the authorization code from pasted input.
pub fn parse_authorization_input(input: &str) -> Result<String, AuthError> {
    if input.is_empty() {
        return Err(AuthError::InvalidAuthorizationResponse(
            "empty input".into(),
        ));
    }

    let redirect = Url::parse(input)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"));
    if let Some(url) = redirect {
        let mut code: Option<String> = None;
        let mut error: Option<String> = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                _ => {}
            }
        }
        if let Some(err) = error {
            return Err(AuthError::AccessDenied(err));
        }
        return code.ok_or(AuthError::MissingAuthorizationCode);
    }

    Ok(input.to_owned())
}
