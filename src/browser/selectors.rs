//! Locators for the bookmaker site's fixed DOM contract.

use super::Selector;

pub fn cookies_accept_button() -> Selector {
    Selector::Id("cookie-consent-button-accept".to_string())
}

pub fn login_button() -> Selector {
    Selector::Id("login-mounted".to_string())
}

pub fn login_username_input() -> Selector {
    Selector::XPath("//input[@id='login-dialog-input-name']".to_string())
}

pub fn login_password_input() -> Selector {
    Selector::XPath("//input[@id='login-dialog-input-password']".to_string())
}

pub fn login_confirm_button() -> Selector {
    Selector::Id("login-dialog-sign-in".to_string())
}

/// The market container card for a given market type id. Collapsed cards
/// render their title only — no embedded newline.
pub fn bet_container(market_type_id: &str) -> Selector {
    Selector::XPath(format!(
        "//div[@data-testing-selector='MatchDetailCard' and @market-type-id='{market_type_id}']"
    ))
}

/// The outcome button for a given bet option id. Renders as
/// `label\nodd` once visible.
pub fn bet_option(bet_option_id: &str) -> Selector {
    Selector::XPath(format!("//button[@data-id='{bet_option_id}']"))
}

pub fn stake_input() -> Selector {
    Selector::XPath("//input[@data-test='betslip-payin-input']".to_string())
}

pub fn placement_button() -> Selector {
    Selector::XPath("//button[@data-test='betslip-placement-button']".to_string())
}
