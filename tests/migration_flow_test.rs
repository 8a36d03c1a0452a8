// End-to-end flow over a real on-disk database: a guild moves from legacy
// config through migration to the workspace schema, and the OAuth broker
// handles a full state round trip alongside it.

use async_trait::async_trait;
use guildvault::clickup::{ClickUpApi, ClickUpError, Workspace};
use guildvault::config::OAuthClientConfig;
use guildvault::crypto::SecretCipher;
use guildvault::oauth::{Provider, StateBroker};
use guildvault::resolver::{resolve_active_clickup_credential, CredentialSource};
use guildvault::status::{ConfigEngine, Recommendation};
use guildvault::store::Store;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct StaticClickUp {
    workspaces: Vec<Workspace>,
}

#[async_trait]
impl ClickUpApi for StaticClickUp {
    async fn list_workspaces(&self, _token: &str) -> Result<Vec<Workspace>, ClickUpError> {
        Ok(self.workspaces.clone())
    }
}

fn test_key() -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode([42u8; 32])
}

fn open_store(dir: &TempDir) -> Arc<Store> {
    Arc::new(Store::open(dir.path().join("guildvault.db")).unwrap())
}

#[tokio::test]
async fn test_legacy_guild_migrates_and_resolves_new_schema() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let cipher = Arc::new(SecretCipher::new(&test_key()).unwrap());
    let engine = ConfigEngine::new(
        Arc::clone(&store),
        Arc::clone(&cipher),
        Arc::new(StaticClickUp {
            workspaces: vec![Workspace {
                id: "9001".to_string(),
                name: "Acme Inc".to_string(),
            }],
        }),
    );

    // Legacy-era setup: single encrypted token, setup marked complete
    let blob = cipher.encrypt("pk_legacy_token").unwrap();
    store
        .upsert_legacy_config(1, Some("9001"), Some(&blob), true)
        .unwrap();

    let status = engine.get_status(1).await.unwrap();
    assert!(status.has_legacy);
    assert!(!status.has_new);
    assert!(status.working);
    assert_eq!(status.recommendation, Recommendation::MigrateRecommended);

    assert!(engine.migrate_legacy_to_new(1, 42).await.unwrap());

    let status = engine.get_status(1).await.unwrap();
    assert!(status.has_new);
    assert_eq!(
        status.default_workspace,
        Some(("9001".to_string(), "Acme Inc".to_string()))
    );
    assert_eq!(status.recommendation, Recommendation::AllGood);

    // Command handlers now resolve the workspace-schema credential
    let cred = resolve_active_clickup_credential(&store, &cipher, 1)
        .unwrap()
        .unwrap();
    assert_eq!(cred.source, CredentialSource::Workspace);
    assert_eq!(cred.token, "pk_legacy_token");

    // Migration is copy-forward: the legacy row survives
    assert!(store.get_legacy_config(1).unwrap().is_some());
}

#[tokio::test]
async fn test_fresh_guild_reports_setup_required() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let cipher = Arc::new(SecretCipher::new(&test_key()).unwrap());
    let engine = ConfigEngine::new(
        Arc::clone(&store),
        Arc::clone(&cipher),
        Arc::new(StaticClickUp { workspaces: vec![] }),
    );

    let status = engine.get_status(99).await.unwrap();
    assert!(!status.has_new);
    assert!(!status.has_legacy);
    assert_eq!(status.recommendation, Recommendation::SetupRequired);
    assert!(!engine.migrate_legacy_to_new(99, 42).await.unwrap());
}

#[tokio::test]
async fn test_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let cipher = SecretCipher::new(&test_key()).unwrap();

    {
        let store = open_store(&dir);
        let blob = cipher.encrypt("pk_persisted").unwrap();
        store
            .upsert_legacy_config(1, Some("9001"), Some(&blob), true)
            .unwrap();
    }

    // Fresh connection, same file
    let store = open_store(&dir);
    let cred = resolve_active_clickup_credential(&store, &cipher, 1)
        .unwrap()
        .unwrap();
    assert_eq!(cred.token, "pk_persisted");
}

#[test]
fn test_oauth_flow_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let broker = StateBroker::new(Arc::clone(&store), Duration::from_secs(600));
    let client = OAuthClientConfig {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        redirect_uri: "https://bot.example.com/auth/clickup/callback".to_string(),
    };

    let request = broker
        .begin_authorization(Provider::ClickUp, &client, 1, 42)
        .unwrap();
    assert!(request.auth_url.contains(&request.state));

    // Callback arrives: the state redeems once and only once
    assert_eq!(
        broker
            .validate_state(&request.state, Provider::ClickUp)
            .unwrap(),
        Some((1, 42))
    );
    assert_eq!(
        broker
            .validate_state(&request.state, Provider::ClickUp)
            .unwrap(),
        None
    );
}
