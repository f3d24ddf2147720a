use chrono::NaiveDateTime;
use url::Url;

const BRAND_NAME: &str = "ShopX";

fn origin_label(app_origin: &str) -> String {
    Url::parse(app_origin)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()))
        .unwrap_or_else(|| app_origin.to_string())
}

pub fn primary_button(url: &str, label: &str) -> String {
    format!(
        r#"<a href="{url}" style="display:inline-block;padding:12px 18px;background-color:#111827;color:#ffffff;text-decoration:none;border-radius:8px;font-weight:600;">{label}</a>"#
    )
}

/// Format cents as a decimal amount, e.g. 1999 -> "19.99".
pub fn format_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

pub fn email_verification_email(app_origin: &str, verify_url: &str) -> (String, String) {
    let subject = format!("Verify your {BRAND_NAME} email address");
    let headline = "Confirm your email";
    let lead = "Please confirm this address so we can reach you about your stores.";
    let button = primary_button(verify_url, "Verify email");
    let body = format!(
        r#"{button}<p style="margin:12px 0 0;color:#374151;">The link expires after a while; you can request a new one from your account settings.</p>"#
    );
    let reason = format!("you created a {BRAND_NAME} account");

    let html = wrap_email(app_origin, headline, lead, &body, &reason);
    (subject, html)
}

pub fn store_invitation_email(
    app_origin: &str,
    store_name: &str,
    inviter_name: &str,
    role: &str,
    accept_url: &str,
    expires_at: NaiveDateTime,
) -> (String, String) {
    let subject = format!("You've been invited to {store_name}");
    let headline = "You're invited!";
    let lead = format!(
        "<strong>{inviter_name}</strong> invited you to join <strong>{store_name}</strong> as <strong>{role}</strong>."
    );
    let button = primary_button(accept_url, "View invitation");
    let body = format!(
        r#"{button}<p style="margin:12px 0 0;color:#374151;">This invitation expires on {}.</p>"#,
        expires_at.format("%Y-%m-%d %H:%M UTC")
    );
    let reason = format!("{inviter_name} invited you to {store_name}");

    let html = wrap_email(app_origin, headline, &lead, &body, &reason);
    (subject, html)
}

pub fn subscription_expiring_email(
    app_origin: &str,
    store_name: &str,
    days_left: i64,
    end_date: NaiveDateTime,
) -> (String, String) {
    let subject = format!("Your {store_name} subscription ends in {days_left} day(s)");
    let headline = "Subscription ending soon";
    let lead = format!(
        "The subscription for <strong>{store_name}</strong> ends on {}.",
        end_date.format("%Y-%m-%d")
    );
    let body = "<p style=\"margin:12px 0 0;color:#374151;\">Renew or enable auto-renewal to keep your store online.</p>";
    let reason = format!("you own {store_name}");

    let html = wrap_email(app_origin, headline, &lead, body, &reason);
    (subject, html)
}

pub fn trial_ending_email(
    app_origin: &str,
    store_name: &str,
    days_left: i64,
) -> (String, String) {
    let subject = format!("Your {store_name} trial ends in {days_left} day(s)");
    let headline = "Your trial is ending";
    let lead = format!("The free trial for <strong>{store_name}</strong> is almost over.");
    let body = "<p style=\"margin:12px 0 0;color:#374151;\">Choose a plan to keep your products and settings.</p>";
    let reason = format!("you own {store_name}");

    let html = wrap_email(app_origin, headline, &lead, body, &reason);
    (subject, html)
}

pub fn invoice_overdue_email(
    app_origin: &str,
    store_name: &str,
    invoice_number: &str,
    amount_cents: i64,
    due_at: NaiveDateTime,
) -> (String, String) {
    let subject = format!("Invoice {invoice_number} is overdue");
    let headline = "Payment overdue";
    let lead = format!(
        "Invoice <strong>{invoice_number}</strong> for <strong>{store_name}</strong> ({}) was due on {}.",
        format_amount(amount_cents),
        due_at.format("%Y-%m-%d")
    );
    let body = "<p style=\"margin:12px 0 0;color:#374151;\">Please settle it to avoid interruption of your subscription.</p>";
    let reason = format!("you own {store_name}");

    let html = wrap_email(app_origin, headline, &lead, body, &reason);
    (subject, html)
}

pub fn usage_limit_email(app_origin: &str, store_name: &str, usage_percentage: f64) -> (String, String) {
    let percent = (usage_percentage * 100.0).round() as i64;
    let subject = format!("{store_name} is at {percent}% of its product limit");
    let headline = "Approaching your plan limit";
    let lead = format!(
        "<strong>{store_name}</strong> uses {percent}% of the products allowed by its plan."
    );
    let body = "<p style=\"margin:12px 0 0;color:#374151;\">Upgrade your plan to keep adding products.</p>";
    let reason = format!("you own {store_name}");

    let html = wrap_email(app_origin, headline, &lead, body, &reason);
    (subject, html)
}

pub fn wrap_email(
    app_origin: &str,
    headline: &str,
    lead: &str,
    body_html: &str,
    reason: &str,
) -> String {
    let origin = origin_label(app_origin);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <body style="background:#f8fafc;margin:0;padding:24px;font-family:Arial,Helvetica,sans-serif;">
    <div style="max-width:560px;margin:0 auto;background:#ffffff;border:1px solid #e5e7eb;border-radius:12px;padding:24px;">
      <div style="font-size:12px;letter-spacing:0.08em;text-transform:uppercase;color:#6b7280;">{brand} - {origin}</div>
      <h1 style="margin:12px 0 8px;font-size:22px;color:#111827;">{headline}</h1>
      <p style="margin:0 0 12px;font-size:15px;color:#111827;line-height:1.6;">{lead}</p>
      {body_html}
      <div style="margin-top:20px;padding-top:16px;border-top:1px solid #e5e7eb;">
        <p style="margin:0 0 6px;font-size:13px;color:#4b5563;">Why you got this email: {reason}.</p>
        <p style="margin:0;font-size:13px;color:#4b5563;">If you didn't expect this, you can safely ignore it.</p>
      </div>
    </div>
  </body>
</html>
"#,
        brand = BRAND_NAME,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_amounts() {
        assert_eq!(format_amount(1999), "19.99");
        assert_eq!(format_amount(5), "0.05");
        assert_eq!(format_amount(-250), "-2.50");
    }

    #[test]
    fn invitation_email_mentions_store_and_link() {
        let expires = chrono::NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 0)
            .unwrap();
        let (subject, html) = store_invitation_email(
            "https://app.shopx.store",
            "Corner Shop",
            "Ada",
            "manager",
            "https://app.shopx.store/invitations/accept?token=abc",
            expires,
        );
        assert!(subject.contains("Corner Shop"));
        assert!(html.contains("token=abc"));
        assert!(html.contains("2025-01-02 03:04 UTC"));
        assert!(html.contains("app.shopx.store"));
    }
}
