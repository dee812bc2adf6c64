// File: mockhub-common/src/models/filter.rs
//
// One filter abstraction for every topic kind. Each kind contributes a schema (its dimensions and
// whether each is required or optional); matching, topic URL reconstruction and storage are all
// driven by that table.

use std::collections::BTreeMap;
use url::Url;

use crate::error::Error;
use crate::models::event::WebhookEvent;
use crate::models::topic::TopicKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Always bound.
    Required,
    /// Bound or wildcard.
    Optional,
}

/// One attribute a filter can pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimension {
    /// Query parameter name on the topic URL.
    pub param: &'static str,
    /// Store column and event attribute name.
    pub column: &'static str,
    pub requirement: Requirement,
}

const fn required(param: &'static str, column: &'static str) -> Dimension {
    Dimension { param, column, requirement: Requirement::Required }
}

const fn optional(param: &'static str, column: &'static str) -> Dimension {
    Dimension { param, column, requirement: Requirement::Optional }
}

#[derive(Debug)]
pub struct FilterSchema {
    pub kind: TopicKind,
    pub dimensions: &'static [Dimension],
    /// The topic URL must carry `first=1`.
    pub requires_first: bool,
    /// Columns of which at least one must be bound. Combinations leaving all of them
    /// wildcard can't exist in the store and are never queried.
    pub at_least_one_of: &'static [&'static str],
}

/// Every column a filter row can have, across all kinds.
pub const FILTER_COLUMNS: [&str; 7] = [
    "from_id",
    "to_id",
    "user_id",
    "extension_id",
    "broadcaster_id",
    "gifter_id",
    "gifter_name",
];

static SCHEMAS: [FilterSchema; 7] = [
    FilterSchema {
        kind: TopicKind::Follows,
        dimensions: &[optional("from_id", "from_id"), optional("to_id", "to_id")],
        requires_first: true,
        at_least_one_of: &["from_id", "to_id"],
    },
    FilterSchema {
        kind: TopicKind::StreamChanged,
        dimensions: &[required("user_id", "user_id")],
        requires_first: false,
        at_least_one_of: &[],
    },
    FilterSchema {
        kind: TopicKind::UserChanged,
        dimensions: &[required("id", "user_id")],
        requires_first: false,
        at_least_one_of: &[],
    },
    FilterSchema {
        kind: TopicKind::ExtensionTransaction,
        dimensions: &[required("extension_id", "extension_id")],
        requires_first: true,
        at_least_one_of: &[],
    },
    FilterSchema {
        kind: TopicKind::ModeratorChange,
        dimensions: &[required("broadcaster_id", "broadcaster_id"), optional("user_id", "user_id")],
        requires_first: true,
        at_least_one_of: &[],
    },
    FilterSchema {
        kind: TopicKind::BanChange,
        dimensions: &[required("broadcaster_id", "broadcaster_id"), optional("user_id", "user_id")],
        requires_first: true,
        at_least_one_of: &[],
    },
    FilterSchema {
        kind: TopicKind::SubscriptionEvent,
        dimensions: &[
            required("broadcaster_id", "broadcaster_id"),
            optional("user_id", "user_id"),
            optional("gifter_id", "gifter_id"),
            optional("gifter_name", "gifter_name"),
        ],
        requires_first: true,
        at_least_one_of: &[],
    },
];

impl TopicKind {
    pub fn filter_schema(&self) -> &'static FilterSchema {
        SCHEMAS
            .iter()
            .find(|schema| schema.kind == *self)
            .unwrap_or(&SCHEMAS[0])
    }
}

/// A single store predicate on one filter column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchTerm {
    /// `column = value`
    Equals { column: &'static str, value: String },
    /// `column IS NULL`
    Wildcard { column: &'static str },
}

impl MatchTerm {
    pub fn column(&self) -> &'static str {
        match self {
            MatchTerm::Equals { column, .. } | MatchTerm::Wildcard { column } => column,
        }
    }
}

/// A conjunction of terms; an event's candidate filters are the disjunction of its clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchClause {
    pub terms: Vec<MatchTerm>,
}

impl MatchClause {
    /// Evaluates the clause against an in-memory filter.
    pub fn is_satisfied_by(&self, filter: &Filter) -> bool {
        self.terms.iter().all(|term| match term {
            MatchTerm::Equals { column, value } => filter.value(column) == Some(value.as_str()),
            MatchTerm::Wildcard { column } => filter.value(column).is_none(),
        })
    }
}

impl FilterSchema {
    pub fn dimension(&self, column: &str) -> Option<&'static Dimension> {
        self.dimensions.iter().find(|dim| dim.column == column)
    }

    pub fn required_dimensions(&self) -> impl Iterator<Item = &'static Dimension> {
        self.dimensions
            .iter()
            .filter(|dim| dim.requirement == Requirement::Required)
    }

    pub fn optional_dimensions(&self) -> impl Iterator<Item = &'static Dimension> {
        self.dimensions
            .iter()
            .filter(|dim| dim.requirement == Requirement::Optional)
    }

    /// Builds the store query for `event`: required dimensions pinned to the event's values,
    /// and one clause per {bound, wildcard} assignment of the optional dimensions.
    ///
    /// An attribute the event doesn't carry is a concrete "absent" value: a clause binding it
    /// could never match a stored filter, so that assignment is skipped and only the wildcard
    /// assignment remains for it. An event missing a required attribute matches nothing.
    pub fn match_clauses(&self, event: &WebhookEvent) -> Vec<MatchClause> {
        if event.kind() != self.kind {
            return Vec::new();
        }

        let mut base = Vec::new();
        for dim in self.required_dimensions() {
            match event.attribute(dim.column) {
                Some(value) => base.push(MatchTerm::Equals {
                    column: dim.column,
                    value: value.to_string(),
                }),
                None => return Vec::new(),
            }
        }

        let optional: Vec<&Dimension> = self.optional_dimensions().collect();
        let mut clauses = Vec::new();

        'assignments: for mask in 0u32..(1u32 << optional.len()) {
            let mut terms = base.clone();
            for (i, dim) in optional.iter().enumerate() {
                if mask & (1 << i) == 0 {
                    terms.push(MatchTerm::Wildcard { column: dim.column });
                    continue;
                }
                match event.attribute(dim.column) {
                    Some(value) => terms.push(MatchTerm::Equals {
                        column: dim.column,
                        value: value.to_string(),
                    }),
                    None => continue 'assignments,
                }
            }

            if !self.at_least_one_of.is_empty() {
                let any_bound = terms.iter().any(|term| {
                    matches!(term, MatchTerm::Equals { column, .. } if self.at_least_one_of.contains(column))
                });
                if !any_bound {
                    continue;
                }
            }

            clauses.push(MatchClause { terms });
        }

        clauses
    }
}

/// A subscription's filter: each dimension of its kind is either bound to a value or wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    kind: TopicKind,
    bindings: BTreeMap<&'static str, String>,
}

impl Filter {
    /// A filter with every dimension wildcard.
    pub fn new(kind: TopicKind) -> Self {
        Self { kind, bindings: BTreeMap::new() }
    }

    /// Binds `column`, or makes it wildcard when `value` is `None`.
    pub fn set(&mut self, column: &str, value: Option<String>) -> Result<(), Error> {
        let dim = self.kind.filter_schema().dimension(column).ok_or_else(|| {
            Error::Parse(format!("'{}' is not a filter dimension of {}", column, self.kind))
        })?;
        match value {
            Some(v) => {
                self.bindings.insert(dim.column, v);
            }
            None => {
                self.bindings.remove(dim.column);
            }
        }
        Ok(())
    }

    pub fn with(mut self, column: &str, value: &str) -> Result<Self, Error> {
        self.set(column, Some(value.to_string()))?;
        Ok(self)
    }

    pub fn kind(&self) -> TopicKind {
        self.kind
    }

    pub fn schema(&self) -> &'static FilterSchema {
        self.kind.filter_schema()
    }

    /// Bound value of `column`; `None` is wildcard.
    pub fn value(&self, column: &str) -> Option<&str> {
        self.bindings.get(column).map(String::as_str)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.bindings.iter().map(|(column, value)| (*column, value.as_str()))
    }

    /// True for every bound dimension equal to the event's attribute. Wildcards match anything,
    /// including an attribute the event doesn't carry.
    pub fn matches(&self, event: &WebhookEvent) -> bool {
        event.kind() == self.kind
            && self
                .bindings
                .iter()
                .all(|(column, value)| event.attribute(column) == Some(value.as_str()))
    }

    /// Rebuilds the topic URL this filter was subscribed with, query sorted by key.
    pub fn topic_url(&self) -> Result<Url, Error> {
        let schema = self.schema();
        let mut url = Url::parse(self.kind.base_url())?;

        let mut params: Vec<(&str, &str)> = Vec::new();
        if schema.requires_first {
            params.push(("first", "1"));
        }
        for dim in schema.dimensions {
            if let Some(value) = self.value(dim.column) {
                params.push((dim.param, value));
            }
        }
        params.sort_by(|a, b| a.0.cmp(b.0));

        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }
}
