//! Plain-data view models for the unlock popup and the feature tile.
//!
//! Nothing here renders. A UI layer reads these structs and decides how to
//! draw them.

use serde::{Deserialize, Serialize};

use crate::definition::{IconRef, UnlockDefinition};
use crate::eligibility::{EligibilityVerdict, ReasonCode};

/// Label shown while the required stage has not been reached.
pub fn requirement_label(required_level: u32) -> String {
    format!("Clear stage {}", required_level)
}

/// Contents of the purchase popup for one feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelView {
    pub name: String,
    pub cost_coin_label: String,
    pub cost_gem_label: String,
    pub requirement_label: String,
    /// Hidden once the confirm action is enabled.
    pub requirement_visible: bool,
    pub confirm_enabled: bool,
    pub reason: ReasonCode,
    pub icon: IconRef,
}

impl PanelView {
    pub fn open(definition: &UnlockDefinition, verdict: EligibilityVerdict) -> Self {
        Self {
            name: definition.name().to_string(),
            cost_coin_label: definition.cost_coin().to_string(),
            cost_gem_label: definition.cost_gem().to_string(),
            requirement_label: requirement_label(definition.required_level()),
            requirement_visible: !verdict.allowed,
            confirm_enabled: verdict.allowed,
            reason: verdict.reason,
            icon: definition.icon().clone(),
        }
    }

    /// Message to show under a disabled confirm button.
    pub fn status_message(&self) -> &'static str {
        self.reason.message()
    }
}

/// Icon tint for the feature tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IconTint {
    /// Original colors.
    Normal,
    /// Greyed out while locked.
    Dimmed,
}

/// State of the feature's own tile (item slot) outside the popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureView {
    /// Empty once unlocked.
    pub requirement_label: String,
    pub icon_tint: IconTint,
    /// Actions that need the feature (equip, level up).
    pub dependent_actions_enabled: bool,
    /// The button that opens the purchase popup.
    pub purchase_affordance_visible: bool,
}

impl FeatureView {
    pub fn for_state(definition: &UnlockDefinition, unlocked: bool) -> Self {
        if unlocked {
            Self {
                requirement_label: String::new(),
                icon_tint: IconTint::Normal,
                dependent_actions_enabled: true,
                purchase_affordance_visible: false,
            }
        } else {
            Self {
                requirement_label: requirement_label(definition.required_level()),
                icon_tint: IconTint::Dimmed,
                dependent_actions_enabled: false,
                purchase_affordance_visible: true,
            }
        }
    }
}
