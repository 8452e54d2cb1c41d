//! Request bodies and query strings.

use chrono::NaiveDate;
use larp_derive::api_model;
use larp_rules::{AwardRecord, EventRecord};
use serde::Deserialize;

#[api_model(skip_none)]
pub struct CreateCampaign {
    pub start_year: i32,
    /// Bonus CP each season adds to the cap. Defaults to 3.
    pub bonus_cp_per_season: Option<i32>,
}

#[api_model]
pub struct AddEvents {
    #[cfg_attr(feature = "server", schema(value_type = Vec<Object>))]
    pub events: Vec<EventRecord>,
}

#[api_model]
pub struct AwardBatch {
    #[cfg_attr(feature = "server", schema(value_type = Vec<Object>))]
    pub awards: Vec<AwardRecord>,
}

/// `?date=YYYY-MM-DD`; the latest values when absent.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "server", into_params(parameter_in = Query))]
pub struct ValuesQuery {
    #[cfg_attr(feature = "server", param(value_type = Option<String>, format = Date))]
    pub date: Option<NaiveDate>,
}
