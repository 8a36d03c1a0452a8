//! OAuth provider definitions and authorization URL construction.

use crate::config::OAuthClientConfig;
use std::fmt;

const CLICKUP_AUTH_URL: &str = "https://app.clickup.com/api";
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_SCOPES: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// The OAuth providers a guild can connect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    ClickUp,
    Google,
}

impl Provider {
    /// Stable identifier used in storage and callback routing.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::ClickUp => "clickup",
            Provider::Google => "google",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the authorization URL a user is sent to, with the CSRF state bound
/// into it.
pub fn build_auth_url(provider: Provider, client: &OAuthClientConfig, state: &str) -> String {
    let client_id = urlencoding::encode(&client.client_id);
    let redirect_uri = urlencoding::encode(&client.redirect_uri);
    let state = urlencoding::encode(state);

    match provider {
        Provider::ClickUp => format!(
            "{CLICKUP_AUTH_URL}?client_id={client_id}&redirect_uri={redirect_uri}\
             &response_type=code&state={state}"
        ),
        Provider::Google => {
            let scope = urlencoding::encode(GOOGLE_SCOPES);
            format!(
                "{GOOGLE_AUTH_URL}?client_id={client_id}&redirect_uri={redirect_uri}\
                 &response_type=code&scope={scope}&access_type=offline\
                 &include_granted_scopes=true&prompt=consent&state={state}"
            )
        }
    }
}
