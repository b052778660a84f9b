//! Constants used throughout the EZ Narratives core crate.
//!
//! Option lists, remote table names and language-model defaults live here so the forms,
//! prompts and repositories agree on them.

/// Base URL for the OpenAI API.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Base URL for the OpenRouter API.
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default chat model when the provider is OpenAI.
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Default chat model when the provider is OpenRouter.
pub const OPENROUTER_DEFAULT_MODEL: &str = "openai/gpt-4-turbo";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

pub const COMPLETION_TEMPERATURE: f32 = 0.7;
pub const NARRATIVE_MAX_TOKENS: u32 = 1500;
pub const CHAT_MAX_TOKENS: u32 = 1000;

/// Similarity cut-off passed to the `match_embeddings` RPC.
pub const MATCH_THRESHOLD: f64 = 0.7;

/// Number of knowledge-base snippets fetched when none is requested.
pub const DEFAULT_TOP_K: u32 = 5;

/// Directory name under the home directory for the offline narrative cache.
pub const DEFAULT_CACHE_DIR_NAME: &str = ".eznarratives_cache";

pub const NARRATIVES_TABLE: &str = "narratives";
pub const SESSIONS_TABLE: &str = "sessions";
pub const USER_ROLES_TABLE: &str = "user_roles";
pub const KB_SOURCES_TABLE: &str = "knowledge_base_sources";
pub const KB_PREFERENCES_TABLE: &str = "user_kb_preferences";
pub const MATCH_EMBEDDINGS_RPC: &str = "match_embeddings";

/// Role value in `user_roles` that grants admin access.
pub const ADMIN_ROLE: &str = "admin";

/// Key under the auth user's metadata that holds saved settings.
pub const SETTINGS_METADATA_KEY: &str = "settings";

/// Verified access tokens kept for resolving callers while the auth server is unreachable.
pub const MAX_REMEMBERED_TOKENS: usize = 1024;

/// Timestamp stamped into stored form data.
pub const FORM_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp used in narrative titles.
pub const TITLE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Timestamp embedded in offline cache file names (millisecond precision).
pub const CACHE_FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// Clock time attached to chat messages, e.g. `02:15 PM`.
pub const MESSAGE_TIME_FORMAT: &str = "%I:%M %p";

/// Display date of a session, e.g. `Mar 04, 2025`.
pub const SESSION_DATE_FORMAT: &str = "%b %d, %Y";

/// Session name timestamp, e.g. `Mar 04, 2025 02:15 PM`.
pub const SESSION_NAME_FORMAT: &str = "%b %d, %Y %I:%M %p";

pub const RESPONSE_DELAY_OPTIONS: &[&str] = &[
    "No response delays",
    "Weather",
    "Traffic",
    "Distance",
    "Directions",
    "Custom",
];

pub const SEX_OPTIONS: &[&str] = &["Male", "Female", "Other"];

pub const PUPILS_OPTIONS: &[&str] = &[
    "PERRL",
    "PERRLA",
    "Unequal",
    "Fixed",
    "Dilated",
    "Constricted",
];

pub const PERTINENT_NEGATIVE_OPTIONS: &[&str] = &[
    "Chest pain",
    "Shortness of breath",
    "Dizziness",
    "Nausea",
    "Vomiting",
    "Headache",
    "Abdominal pain",
    "Back pain",
    "Loss of consciousness",
    "Weakness",
    "Numbness",
    "Tingling",
    "Vision changes",
    "Hearing changes",
];

pub const ABNORMAL_VITAL_OPTIONS: &[&str] = &[
    "Hypertensive",
    "Hypotensive",
    "Tachycardic",
    "Bradycardic",
    "Tachypneic",
    "Bradypneic",
    "Febrile",
    "Hypothermic",
    "Hypoxic",
];

pub const TRANSPORT_POSITION_OPTIONS: &[&str] = &[
    "Position of comfort",
    "Supine",
    "Fowler's",
    "Semi-Fowler's",
    "Left lateral recumbent",
    "Right lateral recumbent",
    "Trendelenburg",
];

pub const FORMAT_TYPE_OPTIONS: &[&str] = &["D.R.A.T.T.", "S.O.A.P.", "C.H.A.R.T.", "Custom"];

/// Emergency type that requires a free-text description.
pub const OTHER_EMERGENCY_TYPE: &str = "Other";

/// NFIRS incident types offered on the fire form.
pub const EMERGENCY_TYPE_OPTIONS: &[&str] = &[
    "Structure Fire",
    "Vehicle Fire",
    "Cooking Fire (Confined)",
    "Chimney/Flue Fire",
    "Fire in Mobile Home",
    "Smoke Scare",
    "Wildland Fire",
    "Brush Fire",
    "Grass Fire",
    "Unauthorized Burning",
    "Smoke Report",
    "Medical Call",
    "MVA w/ Injuries",
    "MVA No Injuries",
    "Extrication",
    "Search for Person on Land",
    "Search for Person in Water",
    "Gas Leak",
    "CO Incident",
    "Power Line Down",
    "Hazardous Materials Spill",
    "Smoke Alarm Activation",
    "False Alarm",
    "Public Assist",
    "Ice Rescue",
    "Water Rescue",
    "Animal Rescue",
    "Technical Rescue",
    "High-Angle Rescue",
    "Confined Space Rescue",
    "Elevator Rescue (Stuck Elevator)",
    "Natural Gas Leak",
    "Electrical Fire",
    "Outdoor Fire",
    OTHER_EMERGENCY_TYPE,
];

/// GCS scores offered on the EMS form, highest first.
pub fn gcs_score_options() -> Vec<String> {
    (1..=15).rev().map(|score| score.to_string()).collect()
}
