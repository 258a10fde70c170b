//! Page rendering collaborator.
//!
//! The auth core only needs a handful of pages (login, forbidden, OAuth
//! landing). Real templates plug in behind `PageRenderer`; `PlainPages` is
//! the built-in fallback.
//!
//! The browser half of the OAuth flow lives in these pages: the login page
//! asks `GET /api/auth/{provider}` for the authorize URL and navigates to it,
//! and the landing page posts `code`/`state` back, stores the credential
//! cookie and continues at the returned `next` path.

use axum::response::Html;

use crate::services::auth::Identity;

pub trait PageRenderer: Send + Sync {
    /// `next` is the local path to return to after sign-in.
    fn login(&self, providers: &[&str], next: &str) -> Html<String>;

    fn forbidden(&self) -> Html<String>;

    /// Landing page for the provider redirect. The browser client posts
    /// `code` and `state` back to `POST /api/auth/{provider}`.
    fn oauth_landing(&self, provider: &str, code: &str, state: &str) -> Html<String>;

    fn oauth_failed(&self, provider: &str) -> Html<String>;

    fn page(&self, title: &str, identity: &Identity) -> Html<String>;

    fn not_found(&self) -> Html<String>;
}

#[derive(Debug, Clone)]
pub struct PlainPages {
    credential_cookie: String,
}

impl PlainPages {
    pub fn new(credential_cookie: impl Into<String>) -> Self {
        Self {
            credential_cookie: credential_cookie.into(),
        }
    }
}

const LOGIN_SCRIPT: &str = r#"<script>
document.querySelectorAll("button[data-provider]").forEach(function (b) {
  b.addEventListener("click", function () {
    var next = document.getElementById("providers").dataset.next;
    fetch("/api/auth/" + encodeURIComponent(b.dataset.provider) + "?next=" + encodeURIComponent(next))
      .then(function (r) { if (!r.ok) throw r; return r.json(); })
      .then(function (body) { window.location.assign(body.url); })
      .catch(function () { document.getElementById("status").textContent = "Sign-in is unavailable."; });
  });
});
</script>"#;

const LANDING_SCRIPT: &str = r#"<script>
(function () {
  var d = document.getElementById("oauth").dataset;
  fetch("/api/auth/" + encodeURIComponent(d.provider), {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify({ code: d.code, state: d.state })
  })
    .then(function (r) { if (!r.ok) throw r; return r.json(); })
    .then(function (body) {
      document.cookie = d.cookie + "=" + body.token + "; path=/; max-age=" + body.expires_in + "; samesite=lax";
      window.location.replace(body.next);
    })
    .catch(function () { document.getElementById("status").textContent = "Sign-in failed."; });
})();
</script>"#;

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{}</title></head><body>{}</body></html>",
        escape(title),
        body
    ))
}

impl PageRenderer for PlainPages {
    fn login(&self, providers: &[&str], next: &str) -> Html<String> {
        let buttons: String = providers
            .iter()
            .map(|p| {
                let p = escape(p);
                format!("<li><button type=\"button\" data-provider=\"{p}\">Sign in with {p}</button></li>")
            })
            .collect();
        layout(
            "Login",
            &format!(
                "<h1>Login</h1><ul id=\"providers\" data-next=\"{}\">{buttons}</ul>\
                 <p id=\"status\"></p>{LOGIN_SCRIPT}",
                escape(next)
            ),
        )
    }

    fn forbidden(&self) -> Html<String> {
        layout(
            "Forbidden",
            "<h1>Forbidden</h1><p>You do not have access to this page.</p>",
        )
    }

    fn oauth_landing(&self, provider: &str, code: &str, state: &str) -> Html<String> {
        layout(
            "Signing in",
            &format!(
                "<div id=\"oauth\" data-provider=\"{}\" data-code=\"{}\" data-state=\"{}\" data-cookie=\"{}\"></div>\
                 <p id=\"status\">Signing in&hellip;</p>{LANDING_SCRIPT}",
                escape(provider),
                escape(code),
                escape(state),
                escape(&self.credential_cookie)
            ),
        )
    }

    fn oauth_failed(&self, provider: &str) -> Html<String> {
        layout(
            "Sign-in failed",
            &format!(
                "<h1>Sign-in failed</h1><p>{} did not complete the sign-in. <a href=\"/login\">Try again</a>.</p>",
                escape(provider)
            ),
        )
    }

    fn page(&self, title: &str, identity: &Identity) -> Html<String> {
        let who = match identity.principal() {
            Some(p) => format!("<p class=\"whoami\">{}</p>", p.subject_id),
            None => String::new(),
        };
        layout(title, &format!("<h1>{}</h1>{who}", escape(title)))
    }

    fn not_found(&self) -> Html<String> {
        layout("Not Found", "<h1>Not Found</h1>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landing_escapes_provider_values() {
        let Html(body) = PlainPages::new("token").oauth_landing("google", "\"><script>x</script>", "s&t");

        assert!(!body.contains("<script>x"));
        assert!(body.contains("&quot;&gt;&lt;script&gt;"));
        assert!(body.contains("s&amp;t"));
    }

    #[test]
    fn login_lists_configured_providers() {
        let Html(body) = PlainPages::new("token").login(&["github", "google"], "/resumebook");

        assert!(body.contains("data-provider=\"github\""));
        assert!(body.contains("data-provider=\"google\""));
        assert!(body.contains("data-next=\"/resumebook\""));
        // providers are reached through the script, not a link to the JSON endpoint
        assert!(!body.contains("href=\"/api/auth/"));
    }

    #[test]
    fn landing_posts_back_and_names_the_cookie() {
        let Html(body) = PlainPages::new("session").oauth_landing("github", "c0de", "st4te");

        assert!(body.contains("data-cookie=\"session\""));
        assert!(body.contains("method: \"POST\""));
        assert!(body.contains("body.next"));
    }
}
