//! Signed redirect builder.
//!
//! For a payment attempt formgate hands the gateway four callback URLs,
//! one per [`OutcomeTag`]. Each URL carries the original parameters plus
//! `status=<tag>` and an `hmac` over all of them, so the callback can be
//! authenticated without any server-side state.

use formgate_sdk::objects::{OutcomeTag, ReturnUrls};
use formgate_sdk::params::{self, Params, ParamsError};
use formgate_sdk::signature::{self, AuthorizationSalt, SIGNATURE_PARAM, SignatureError};
use url::Url;

/// Query parameter carrying the outcome tag inside a signed URL.
pub const STATUS_PARAM: &str = "status";

#[derive(Debug, thiserror::Error)]
pub enum RedirectError {
    #[error("refusing to sign redirect URLs with an empty authorization salt")]
    EmptySalt,
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),
    #[error("parameters cannot be carried in a url: {0}")]
    Params(#[from] ParamsError),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// Four signed callback URLs in tag order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTargetSet {
    targets: Vec<(OutcomeTag, Url)>,
}

impl RedirectTargetSet {
    pub fn get(&self, tag: OutcomeTag) -> Option<&Url> {
        self.targets.iter().find(|(t, _)| *t == tag).map(|(_, url)| url)
    }

    pub fn iter(&self) -> impl Iterator<Item = (OutcomeTag, &Url)> {
        self.targets.iter().map(|(tag, url)| (*tag, url))
    }

    /// The set in the shape the gateway expects.
    pub fn to_return_urls(&self) -> Option<ReturnUrls> {
        Some(ReturnUrls {
            success: self.get(OutcomeTag::Success)?.clone(),
            cancel: self.get(OutcomeTag::Canceled)?.clone(),
            error: self.get(OutcomeTag::Error)?.clone(),
            reject: self.get(OutcomeTag::Reject)?.clone(),
        })
    }
}

/// Builds [`RedirectTargetSet`]s onto a fixed callback URL.
#[derive(Debug, Clone)]
pub struct SignedRedirectBuilder {
    callback: Url,
    salt: AuthorizationSalt,
}

impl SignedRedirectBuilder {
    pub fn new(callback: Url, salt: AuthorizationSalt) -> Self {
        Self { callback, salt }
    }

    pub fn build(&self, params: &Params) -> Result<RedirectTargetSet, RedirectError> {
        if self.salt.is_empty() {
            return Err(RedirectError::EmptySalt);
        }
        let targets = OutcomeTag::ALL
            .into_iter()
            .map(|tag| self.build_one(params, tag).map(|url| (tag, url)))
            .collect::<Result<Vec<_>, RedirectError>>()?;
        Ok(RedirectTargetSet { targets })
    }

    fn build_one(&self, params: &Params, tag: OutcomeTag) -> Result<Url, RedirectError> {
        // Parameters already on the callback URL are signed along with the rest.
        let mut tagged = self.callback.query().map(params::parse_query).unwrap_or_default();
        tagged.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        tagged.remove(SIGNATURE_PARAM);
        tagged.insert(STATUS_PARAM.to_owned(), tag.as_str().into());

        let encoded = params::to_query_string(&tagged)?;
        let hash = signature::generate_hash(&tagged, self.salt.as_bytes())?;
        let query = format!("{encoded}&{SIGNATURE_PARAM}={hash}");

        let mut url = self.callback.clone();
        url.set_query(Some(&query));
        Ok(url)
    }
}
