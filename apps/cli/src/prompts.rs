//! Interactive prompts for target management.

use std::collections::BTreeMap;

use color_eyre::eyre::{Result, eyre};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use lookout_shared::Target;

fn required(theme: &ColorfulTheme, prompt: &str) -> Result<String> {
    let value: String = Input::with_theme(theme)
        .with_prompt(prompt)
        .interact_text()?;
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(eyre!("{prompt} is required"));
    }
    Ok(value)
}

fn optional(theme: &ColorfulTheme, prompt: &str) -> Result<Option<String>> {
    let value: String = Input::with_theme(theme)
        .with_prompt(format!("{prompt} (optional)"))
        .allow_empty(true)
        .interact_text()?;
    let value = value.trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}

/// Keep asking until an empty answer.
fn repeated(theme: &ColorfulTheme, prompt: &str) -> Result<Option<Vec<String>>> {
    let mut values = Vec::new();
    while let Some(value) = optional(theme, prompt)? {
        values.push(value);
    }
    Ok((!values.is_empty()).then_some(values))
}

/// Walk the user through every target field.
pub(crate) fn prompt_target() -> Result<Target> {
    let theme = ColorfulTheme::default();
    println!("Adding new competitor target (press Enter to skip optional fields)");

    let mut target = Target::new(
        required(&theme, "Company name")?,
        required(&theme, "Website URL")?,
    );
    target.changelog_url = optional(&theme, "Changelog URL")?;
    target.pricing_url = optional(&theme, "Pricing URL")?;
    target.blog_url = optional(&theme, "Blog URL")?;
    target.social_urls = repeated(&theme, "Social URL")?;

    let mut stores = BTreeMap::new();
    if let Some(url) = optional(&theme, "iOS App Store URL")? {
        stores.insert("ios".to_string(), url);
    }
    if let Some(url) = optional(&theme, "Android App Store URL")? {
        stores.insert("android".to_string(), url);
    }
    target.app_store_urls = (!stores.is_empty()).then_some(stores);
    target.rss_feeds = repeated(&theme, "RSS feed URL")?;

    Ok(target)
}

/// Pick a target to remove; `None` when the user backs out.
pub(crate) fn select_target(targets: &[Target]) -> Result<Option<usize>> {
    let theme = ColorfulTheme::default();
    let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
    let index = Select::with_theme(&theme)
        .with_prompt("Target to remove")
        .items(&names)
        .default(0)
        .interact_opt()?;

    let Some(index) = index else {
        return Ok(None);
    };
    let confirmed = Confirm::with_theme(&theme)
        .with_prompt(format!("Remove {}?", names[index]))
        .default(false)
        .interact()?;
    Ok(confirmed.then_some(index))
}
