/// Request header set by the enhancement library on partial requests.
pub const HX_REQUEST: &str = "HX-Request";
/// Response header listing client-side events to fire.
pub const HX_TRIGGER: &str = "HX-Trigger";
/// Response header telling an enhanced client to navigate.
pub const HX_REDIRECT: &str = "HX-Redirect";

pub const CHARACTERS_PATH: &str = "/api/characters";
pub const CAMPAIGNS_PATH: &str = "/api/campaigns";

pub const CHARACTER_TAG: &str = "Characters";
pub const CAMPAIGN_TAG: &str = "Campaigns";
pub const SYSTEM_TAG: &str = "System";

pub const DEFAULT_UNDO_STACK_SIZE: usize = 20;
pub const DEFAULT_PORT: u16 = 4583;
