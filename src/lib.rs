// Process configuration from environment
pub mod config;

// Secret encryption (AES-256-GCM)
pub mod crypto;

// Per-guild credential storage
pub mod store;

// ClickUp API surface used for validation and migration
pub mod clickup;

// Active ClickUp credential resolution
pub mod resolver;

// Configuration health and legacy-to-new migration
pub mod status;

// OAuth state brokering
pub mod oauth;
