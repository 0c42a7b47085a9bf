//! User-facing message bodies and keyboard labels. All strings use Telegram
//! HTML formatting and are kept out of the controller logic so the flow code
//! stays readable.

use shared::domain::{ClaimStatus, UserId};
use storage::UserRecord;

use crate::BotProfile;

pub const CLAIM_BUTTON: &str = "\u{1F4B0} Claim Bonus";
pub const DONE_BUTTON: &str = "\u{2705} Done";
pub const STATUS_BUTTON: &str = "\u{1F4CA} My Status";
pub const HELP_BUTTON: &str = "\u{2139}\u{FE0F} Help";

fn divider() -> &'static str {
    "\n\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\n"
}

fn thin_line() -> &'static str {
    "\n\u{2508}\u{2508}\u{2508}\u{2508}\u{2508}\u{2508}\u{2508}\u{2508}\u{2508}\u{2508}\u{2508}\u{2508}\u{2508}\u{2508}\u{2508}\n"
}

pub fn welcome(profile: &BotProfile) -> String {
    format!(
        "\u{1F3C6} <b>Welcome to {brand}!</b>\n{div}\
         \u{1F4B5} <b>Get Your $42 Bonus</b>\n\n\
         <b>How it works:</b>\n\
         \x20 1. Sign up with our code\n\
         \x20 2. Deposit $42 + wager\n\
         \x20 3. Submit your username\n\
         \x20 4. Get approved!\n{line}\
         \u{1F4CB} <b>Code:</b> <code>{code}</code>\n\
         \u{1F517} <b>Link:</b> {link}\n{div}\
         \u{1F447} Tap <b>Claim Bonus</b> to start",
        brand = profile.brand_name,
        code = profile.referral_code,
        link = profile.referral_link,
        div = divider(),
        line = thin_line(),
    )
}

pub fn claim_instructions(profile: &BotProfile) -> String {
    format!(
        "\u{1F4B0} <b>Claim Your $42 Bonus</b>\n{div}\
         <b>Step 1:</b> Complete Requirements\n\n\
         \x20 \u{25B8} Sign up using the link below\n\
         \x20 \u{25B8} Use code: <code>{code}</code>\n\
         \x20 \u{25B8} Deposit $42 and place a wager\n{line}\
         \u{1F517} {link}\n{div}\
         <b>Step 2:</b> Tap <b>Done</b> when ready",
        code = profile.referral_code,
        link = profile.referral_link,
        div = divider(),
        line = thin_line(),
    )
}

pub fn identity_prompt() -> String {
    "\u{2705} <b>Great!</b>\n\n\
     Now send your <b>platform username</b>\n\
     so we can verify your account."
        .to_string()
}

pub fn invalid_identity() -> String {
    "\u{26A0}\u{FE0F} Please enter a valid username.".to_string()
}

pub fn submission_confirmed(identity: &str) -> String {
    format!(
        "\u{1F389} <b>Submitted!</b>\n{div}\
         Username: <code>{identity}</code>\n\n\
         We'll verify within 24-48 hours.\n\
         You'll be notified when approved.",
        div = divider(),
    )
}

pub fn admin_summary(record: &UserRecord, identity: &str) -> String {
    let handle = record
        .handle
        .as_deref()
        .map(|h| format!("@{h}"))
        .unwrap_or_else(|| "\u{2014}".to_string());
    format!(
        "\u{1F195} <b>New Submission</b>\n\
         \u{250C} User: {handle}\n\
         \u{251C} Platform: <code>{identity}</code>\n\
         \u{2514} ID: <code>{id}</code>\n\n\
         <code>/setstatus {id} Verified</code>",
        id = record.user_id,
    )
}

pub fn status_view(record: &UserRecord) -> String {
    let icon = match record.status {
        ClaimStatus::Pending => "\u{23F3}",
        ClaimStatus::Verified => "\u{2705}",
        ClaimStatus::Rejected => "\u{274C}",
    };
    let footer = match record.status {
        ClaimStatus::Pending => "Your submission is being reviewed.",
        ClaimStatus::Verified => "Your bonus has been approved! \u{1F389}",
        ClaimStatus::Rejected => "Contact support for details.",
    };
    format!(
        "\u{1F4CA} <b>Your Status</b>\n{div}\
         <b>ID:</b> <code>{id}</code>\n\
         <b>Username:</b> {identity}\n\
         <b>Status:</b> {icon} {status}\n{div}\
         {footer}",
        id = record.user_id,
        identity = record
            .platform_identity
            .as_deref()
            .unwrap_or("\u{2014}"),
        status = record.status,
        div = divider(),
    )
}

pub fn help(profile: &BotProfile) -> String {
    format!(
        "\u{2139}\u{FE0F} <b>Help</b>\n{div}\
         <b>How to claim your bonus:</b>\n\n\
         \x20 1. Sign up \u{2192} {link}\n\
         \x20 2. Use code: <code>{code}</code>\n\
         \x20 3. Deposit $42 + wager\n\
         \x20 4. Submit username\n\
         \x20 5. Wait 24-48 hrs\n{div}\
         Questions? Contact support.",
        code = profile.referral_code,
        link = profile.referral_link,
        div = divider(),
    )
}

pub fn wait_a_moment() -> String {
    "\u{23F1} Please wait a moment...".to_string()
}

pub fn not_allowed() -> String {
    "Not allowed here.".to_string()
}

pub fn setstatus_usage() -> String {
    "Usage: /setstatus <telegram_id> <Pending|Verified|Rejected>".to_string()
}

pub fn invalid_target_id() -> String {
    "Invalid telegram_id.".to_string()
}

pub fn invalid_status() -> String {
    "Status must be Pending, Verified, or Rejected.".to_string()
}

pub fn target_not_found() -> String {
    "User not found in database.".to_string()
}

pub fn status_updated(target: UserId, status: ClaimStatus) -> String {
    format!("Updated status for {target} \u{2192} <b>{status}</b>")
}

pub fn status_changed_notice(status: ClaimStatus) -> String {
    format!("\u{1F514} Your verification status is now: <b>{status}</b>")
}

pub fn broadcast_usage() -> String {
    "Usage: /broadcast <text>".to_string()
}

pub fn broadcast_report(sent: usize) -> String {
    format!("Broadcast sent to <b>{sent}</b> users.")
}

pub fn export_caption() -> &'static str {
    "Exported users CSV"
}

pub fn stats(profile: &BotProfile, total: i64, by_status: &[(ClaimStatus, i64)]) -> String {
    let mut out = format!(
        "\u{1F4C8} <b>Bot Statistics</b>\n{div}\
         <b>Referral Code:</b> <code>{code}</code>\n\
         <b>Total Users:</b> {total}\n\n\
         <b>By Status:</b>\n",
        code = profile.referral_code,
        div = divider(),
    );
    for status in ClaimStatus::ALL {
        let count = by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, c)| *c)
            .unwrap_or(0);
        out.push_str(&format!("\u{2022} {status}: {count}\n"));
    }
    out
}
