//! Conversion of outbound cookie instructions into `Set-Cookie` headers.

use axum::http::{HeaderMap, HeaderValue, header};
use axum_extra::extract::cookie::{Cookie, SameSite};
use tessera::SetCookie;
use time::OffsetDateTime;

/// Build a `cookie` crate cookie from an outbound instruction
pub fn to_cookie(instruction: SetCookie) -> Cookie<'static> {
    let same_site = match instruction.same_site {
        tessera::SameSite::Strict => SameSite::Strict,
        tessera::SameSite::Lax => SameSite::Lax,
        tessera::SameSite::None => SameSite::None,
    };

    let mut builder = Cookie::build((instruction.name, instruction.value))
        .path(instruction.path)
        .http_only(instruction.http_only)
        .secure(instruction.secure)
        .same_site(same_site);

    if !instruction.domain.is_empty() {
        builder = builder.domain(instruction.domain);
    }

    // No expiry means a browser-session cookie
    if let Some(expires) = instruction.expires {
        match OffsetDateTime::from_unix_timestamp(expires.timestamp()) {
            Ok(at) => builder = builder.expires(at),
            Err(e) => tracing::warn!(error = %e, "Cookie expiry out of range, sending without"),
        }
    }

    builder.build()
}

/// Append each instruction as its own `Set-Cookie` header
pub fn append_set_cookies(headers: &mut HeaderMap, instructions: Vec<SetCookie>) {
    for instruction in instructions {
        let name = instruction.name.clone();
        match HeaderValue::from_str(&to_cookie(instruction).to_string()) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!(cookie = %name, error = %e, "Unencodable Set-Cookie header"),
        }
    }
}
