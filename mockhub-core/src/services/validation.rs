// src/services/validation.rs
//
// Subscribe/unsubscribe request checks. Each check is a standalone function returning
// `Error::BadRequest` (or `TopicUnknown`) so callers and tests can run them one at a time.

use url::Url;

use mockhub_common::models::{Filter, HubMode, HubSubscriptionRequest, TopicKind};
use mockhub_common::models::topic::topic_base;

use crate::Error;

/// Longest lease a subscriber can ask for (ten days).
pub const MAX_LEASE_SECONDS: i64 = 864_000;

/// Longest `hub.secret`, in encoded bytes.
pub const MAX_SECRET_BYTES: usize = 200;

/// A request that passed every generic check.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub mode: HubMode,
    pub callback: Url,
    pub topic: Url,
    pub kind: TopicKind,
    /// Always set for subscribe.
    pub lease_seconds: Option<i64>,
}

pub fn validate_callback(callback: &str) -> Result<Url, Error> {
    match Url::parse(callback) {
        Ok(url) if !url.cannot_be_a_base() => Ok(url),
        _ => Err(Error::bad_request(format!("Cannot parse hub callback ({})", callback))),
    }
}

pub fn parse_mode(mode: &str) -> Result<HubMode, Error> {
    mode.parse::<HubMode>().map_err(Error::BadRequest)
}

/// Classifies the topic URL by its origin and path.
pub fn resolve_topic(topic: &str) -> Result<(Url, TopicKind), Error> {
    let url = Url::parse(topic).map_err(|_| Error::TopicUnknown(topic.to_string()))?;
    let kind = TopicKind::from_base_url(&topic_base(&url))
        .ok_or_else(|| Error::TopicUnknown(topic.to_string()))?;
    Ok((url, kind))
}

pub fn validate_lease(lease_seconds: i64) -> Result<i64, Error> {
    if (0..=MAX_LEASE_SECONDS).contains(&lease_seconds) {
        Ok(lease_seconds)
    } else {
        Err(Error::bad_request(format!(
            "Lease seconds must be between 0 and {}, inclusive.",
            MAX_LEASE_SECONDS
        )))
    }
}

pub fn validate_secret(secret: &str) -> Result<(), Error> {
    if secret.len() <= MAX_SECRET_BYTES {
        Ok(())
    } else {
        Err(Error::bad_request(format!(
            "hub.secret must be a string that has a length less than {} bytes.",
            MAX_SECRET_BYTES
        )))
    }
}

/// The caller's query must already be in key order; the hub doesn't reorder it for them.
pub fn ensure_sorted_query(topic: &Url) -> Result<(), Error> {
    let keys: Vec<_> = topic.query_pairs().map(|(key, _)| key).collect();
    if keys.windows(2).all(|pair| pair[0] <= pair[1]) {
        Ok(())
    } else {
        Err(Error::bad_request("Search params must be specified in alphabetical order!"))
    }
}

/// First non-empty value of `name` in the topic query.
fn query_param(topic: &Url, name: &str) -> Option<String> {
    topic
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Runs the topic kind's parameter checks and builds the filter the subscription is stored with.
pub fn extract_filter(kind: TopicKind, topic: &Url) -> Result<Filter, Error> {
    let schema = kind.filter_schema();

    if schema.requires_first && query_param(topic, "first").as_deref() != Some("1") {
        return Err(Error::bad_request("first=1 must be defined"));
    }

    for dim in schema.required_dimensions() {
        if query_param(topic, dim.param).is_none() {
            return Err(Error::bad_request(format!("{} must be specified", dim.param)));
        }
    }

    if !schema.at_least_one_of.is_empty() {
        let any_bound = schema
            .dimensions
            .iter()
            .filter(|dim| schema.at_least_one_of.contains(&dim.column))
            .any(|dim| query_param(topic, dim.param).is_some());
        if !any_bound {
            return Err(Error::bad_request(format!(
                "Either {} MUST be defined!",
                schema.at_least_one_of.join(" or ")
            )));
        }
    }

    let mut filter = Filter::new(kind);
    for dim in schema.dimensions {
        filter.set(dim.column, query_param(topic, dim.param))?;
    }
    Ok(filter)
}

/// The generic checks, in order: callback, mode, topic, lease (required for subscribe),
/// secret, then query ordering.
pub fn validate_request(request: &HubSubscriptionRequest) -> Result<ValidatedRequest, Error> {
    let callback = validate_callback(&request.callback)?;
    let mode = parse_mode(&request.mode)?;
    let (topic, kind) = resolve_topic(&request.topic)?;

    let lease_seconds = match (mode, request.lease_seconds) {
        (_, Some(lease)) => Some(validate_lease(lease)?),
        (HubMode::Subscribe, None) => {
            return Err(Error::bad_request("No hub.lease_seconds on request object"));
        }
        (HubMode::Unsubscribe, None) => None,
    };

    validate_secret(&request.secret)?;
    ensure_sorted_query(&topic)?;

    Ok(ValidatedRequest { mode, callback, topic, kind, lease_seconds })
}
