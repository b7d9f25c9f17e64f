//! Plain-old-XML autodiscover request and response documents.

use super::{AutodiscoverSettings, ProtocolSettings};
use crate::config::parse_url;
use crate::error::{Error, Result};
use crate::xml::XmlWriter;
use serde::Deserialize;
use url::Url;

/// Namespace of the POX request.
pub const REQUEST_NS: &str =
    "http://schemas.microsoft.com/exchange/autodiscover/outlook/requestschema/2006";
/// Response schema requested in `AcceptableResponseSchema`.
pub const RESPONSE_SCHEMA: &str =
    "http://schemas.microsoft.com/exchange/autodiscover/outlook/responseschema/2006a";

/// Protocol types in order of preference for the EWS endpoint.
const PREFERRED_PROTOCOLS: &[&str] = &["EXCH", "EXPR"];

/// What an autodiscover response asks the resolver to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum PoxResponse {
    /// `Action` was `settings`.
    Settings(AutodiscoverSettings),
    /// `Action` was `redirectAddr`: start over with this address.
    RedirectAddr(String),
    /// `Action` was `redirectUrl`: probe this URL next.
    RedirectUrl(Url),
}

/// Serializes the request document for `email`.
pub fn request_body(email: &str) -> Result<String> {
    let mut w = XmlWriter::new();
    w.declaration()?;
    w.start("Autodiscover", &[("xmlns", REQUEST_NS)])?;
    w.open("Request")?;
    w.text_element("EMailAddress", email)?;
    w.text_element("AcceptableResponseSchema", RESPONSE_SCHEMA)?;
    w.end("Request")?;
    w.end("Autodiscover")?;
    Ok(w.into_string())
}

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(rename = "Response")]
    response: ResponseBlock,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResponseBlock {
    account: Option<AccountBlock>,
    error: Option<ErrorBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AccountBlock {
    action: Option<String>,
    redirect_addr: Option<String>,
    redirect_url: Option<String>,
    #[serde(rename = "Protocol", default)]
    protocols: Vec<ProtocolBlock>,
}

#[derive(Debug, Deserialize)]
struct ProtocolBlock {
    #[serde(rename = "Type")]
    kind: Option<String>,
    #[serde(rename = "EwsUrl")]
    ews_url: Option<String>,
    #[serde(rename = "OABUrl")]
    oab_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBlock {
    error_code: Option<String>,
    message: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses a response document.
///
/// # Errors
///
/// An `<Error>` block yields [`Error::AutodiscoverResponse`]; a body that is
/// not an autodiscover document yields [`Error::PoxParse`].
pub fn parse_response(body: &str) -> Result<PoxResponse> {
    let document: Document =
        quick_xml::de::from_str(body).map_err(|source| Error::PoxParse { source })?;

    if let Some(error) = document.response.error {
        return Err(Error::AutodiscoverResponse {
            code: non_empty(error.error_code).unwrap_or_default(),
            message: non_empty(error.message).unwrap_or_default(),
        });
    }

    let account = document
        .response
        .account
        .ok_or_else(|| Error::malformed("autodiscover response without Account"))?;

    let action = non_empty(account.action);
    match action.as_deref() {
        Some("redirectAddr") => {
            let addr = non_empty(account.redirect_addr)
                .ok_or_else(|| Error::malformed("redirectAddr without RedirectAddr"))?;
            Ok(PoxResponse::RedirectAddr(addr))
        }
        Some("redirectUrl") => {
            let url = non_empty(account.redirect_url)
                .ok_or_else(|| Error::malformed("redirectUrl without RedirectUrl"))?;
            Ok(PoxResponse::RedirectUrl(parse_url(&url)?))
        }
        Some("settings") | None => settings(account.protocols).map(PoxResponse::Settings),
        Some(other) => Err(Error::malformed(format!(
            "unknown autodiscover action '{other}'"
        ))),
    }
}

fn settings(blocks: Vec<ProtocolBlock>) -> Result<AutodiscoverSettings> {
    let protocols = blocks
        .into_iter()
        .map(|block| {
            Ok(ProtocolSettings {
                kind: non_empty(block.kind).unwrap_or_default(),
                ews_url: non_empty(block.ews_url).map(|u| parse_url(&u)).transpose()?,
                oab_url: non_empty(block.oab_url).map(|u| parse_url(&u)).transpose()?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let chosen = PREFERRED_PROTOCOLS
        .iter()
        .find_map(|kind| {
            protocols
                .iter()
                .find(|p| p.kind == *kind && p.ews_url.is_some())
        })
        .or_else(|| protocols.iter().find(|p| p.ews_url.is_some()))
        .ok_or_else(|| Error::malformed("autodiscover settings without an EwsUrl"))?;

    let ews_url = chosen
        .ews_url
        .clone()
        .ok_or_else(|| Error::malformed("autodiscover settings without an EwsUrl"))?;
    let oab_url = chosen
        .oab_url
        .clone()
        .or_else(|| protocols.iter().find_map(|p| p.oab_url.clone()));

    Ok(AutodiscoverSettings {
        ews_url,
        oab_url,
        protocols,
    })
}
