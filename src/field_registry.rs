/*!
 Field Registry

 Central authoritative definition of:
  - Canonical field names (British English for programme-related fields)
  - Field metadata (data type, description, read-only flag)
  - Domain membership (stream / epg / filter / rule / request)
  - Alias → canonical mapping (American spellings & legacy variants)
  - Utility accessors for the validator, parser and adapters

 Usage pattern (high-level):
   let reg = FieldRegistry::global();
   let canonical = reg.resolve("program_title"); // -> "programme_title"
   let ok = reg.validate_for_domain("channel_name", FieldDomain::Stream);

 Read-only fields (source_* and the request-derived fields) are enforced
 by the validator checking `is_read_only` on action targets.

 NOTE: This module intentionally has no dependency on the expression
 parser to avoid circular references. The parser and validator *consume*
 this module, not the other way round.
*/

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Domain a field belongs to. A field may be a member of several.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldDomain {
    /// Stream channel records (M3U side).
    Stream,
    /// EPG channel / programme records (XMLTV side).
    Epg,
    /// Usable in filter predicates.
    Filter,
    /// Usable as a data-mapping rule target or reference.
    Rule,
    /// Derived from the HTTP request (client detection).
    Request,
}

/// Declared data type of a field. Comparison stays string-based; the type
/// informs the validator and future stricter operator checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    DateTime,
}

/// Descriptor for a single canonical field.
pub struct FieldDefinition {
    pub name: &'static str,
    pub field_type: FieldType,
    pub description: &'static str,
    pub aliases: &'static [&'static str],
    pub domains: &'static [FieldDomain],
    pub read_only: bool,
}

/// Convenience macro to define a FieldDefinition.
macro_rules! fd {
    (
        name: $name:expr,
        ty: $ty:expr,
        desc: $desc:expr,
        aliases: [$($alias:expr),* $(,)?],
        domains: [$($dom:expr),* $(,)?],
        read_only: $ro:expr
    ) => {
        FieldDefinition {
            name: $name,
            field_type: $ty,
            description: $desc,
            aliases: &[$($alias),*],
            domains: &[$($dom),*],
            read_only: $ro,
        }
    };
}

/// Static registry of canonical definitions.
/// NOTE: Keep grouping per domain for clarity.
static FIELD_DEFINITIONS: &[FieldDefinition] = &[
    // ---------------------------
    // Stream Channel Fields
    // ---------------------------
    fd! {
        name: "channel_name",
        ty: FieldType::String,
        desc: "Display name of the channel",
        aliases: [],
        domains: [FieldDomain::Stream, FieldDomain::Filter, FieldDomain::Rule],
        read_only: false
    },
    fd! {
        name: "group_title",
        ty: FieldType::String,
        desc: "Channel group / category",
        aliases: ["group"],
        domains: [FieldDomain::Stream, FieldDomain::Filter, FieldDomain::Rule],
        read_only: false
    },
    fd! {
        name: "tvg_id",
        ty: FieldType::String,
        desc: "TV guide identifier linking to EPG data",
        aliases: [],
        domains: [FieldDomain::Stream, FieldDomain::Filter, FieldDomain::Rule],
        read_only: false
    },
    fd! {
        name: "tvg_name",
        ty: FieldType::String,
        desc: "TV guide display name",
        aliases: [],
        domains: [FieldDomain::Stream, FieldDomain::Filter, FieldDomain::Rule],
        read_only: false
    },
    fd! {
        name: "tvg_logo",
        ty: FieldType::String,
        desc: "Channel logo URL",
        aliases: ["logo"],
        domains: [FieldDomain::Stream, FieldDomain::Filter, FieldDomain::Rule],
        read_only: false
    },
    fd! {
        name: "tvg_shift",
        ty: FieldType::String,
        desc: "Timeshift offset (e.g. +1, +24)",
        aliases: [],
        domains: [FieldDomain::Stream, FieldDomain::Filter, FieldDomain::Rule],
        read_only: false
    },
    fd! {
        name: "tvg_chno",
        ty: FieldType::Integer,
        desc: "Preferred channel number",
        aliases: ["channel_number"],
        domains: [FieldDomain::Stream, FieldDomain::Filter, FieldDomain::Rule],
        read_only: false
    },
    fd! {
        name: "stream_url",
        ty: FieldType::String,
        desc: "Upstream stream URL",
        aliases: [],
        domains: [FieldDomain::Stream, FieldDomain::Filter, FieldDomain::Rule],
        read_only: false
    },
    fd! {
        name: "preferred_video_codec",
        ty: FieldType::String,
        desc: "Codec hint selected for the requesting client",
        aliases: ["video_codec"],
        domains: [FieldDomain::Stream, FieldDomain::Rule],
        read_only: false
    },
    // ---------------------------
    // Source Meta (read-only for both record domains)
    // ---------------------------
    fd! {
        name: "source_name",
        ty: FieldType::String,
        desc: "Name of the originating source",
        aliases: [],
        domains: [FieldDomain::Stream, FieldDomain::Epg, FieldDomain::Filter, FieldDomain::Rule],
        read_only: true
    },
    fd! {
        name: "source_type",
        ty: FieldType::String,
        desc: "Type of the originating source (m3u, xtream, xmltv)",
        aliases: [],
        domains: [FieldDomain::Stream, FieldDomain::Epg, FieldDomain::Filter, FieldDomain::Rule],
        read_only: true
    },
    fd! {
        name: "source_url",
        ty: FieldType::String,
        desc: "Sanitised URL of the originating source",
        aliases: [],
        domains: [FieldDomain::Stream, FieldDomain::Epg, FieldDomain::Filter, FieldDomain::Rule],
        read_only: true
    },
    // ---------------------------
    // EPG Channel / Programme Fields
    // ---------------------------
    fd! {
        name: "channel_id",
        ty: FieldType::String,
        desc: "EPG channel identifier",
        aliases: [],
        domains: [FieldDomain::Epg, FieldDomain::Filter, FieldDomain::Rule],
        read_only: false
    },
    fd! {
        name: "channel_logo",
        ty: FieldType::String,
        desc: "EPG channel logo URL",
        aliases: [],
        domains: [FieldDomain::Epg, FieldDomain::Filter, FieldDomain::Rule],
        read_only: false
    },
    fd! {
        name: "channel_group",
        ty: FieldType::String,
        desc: "EPG channel group",
        aliases: [],
        domains: [FieldDomain::Epg, FieldDomain::Filter, FieldDomain::Rule],
        read_only: false
    },
    fd! {
        name: "language",
        ty: FieldType::String,
        desc: "Programme language code",
        aliases: [],
        domains: [FieldDomain::Epg, FieldDomain::Filter, FieldDomain::Rule],
        read_only: false
    },
    fd! {
        name: "programme_title",
        ty: FieldType::String,
        desc: "Programme title",
        aliases: ["program_title", "title"],
        domains: [FieldDomain::Epg, FieldDomain::Filter, FieldDomain::Rule],
        read_only: false
    },
    fd! {
        name: "programme_description",
        ty: FieldType::String,
        desc: "Programme description",
        aliases: ["program_description", "description"],
        domains: [FieldDomain::Epg, FieldDomain::Filter, FieldDomain::Rule],
        read_only: false
    },
    fd! {
        name: "programme_category",
        ty: FieldType::String,
        desc: "Programme category",
        aliases: ["program_category", "category"],
        domains: [FieldDomain::Epg, FieldDomain::Filter, FieldDomain::Rule],
        read_only: false
    },
    fd! {
        name: "programme_icon",
        ty: FieldType::String,
        desc: "Programme icon URL",
        aliases: ["program_icon"],
        domains: [FieldDomain::Epg, FieldDomain::Filter, FieldDomain::Rule],
        read_only: false
    },
    fd! {
        name: "programme_subtitle",
        ty: FieldType::String,
        desc: "Programme subtitle",
        aliases: ["program_subtitle", "subtitles"],
        domains: [FieldDomain::Epg, FieldDomain::Filter, FieldDomain::Rule],
        read_only: false
    },
    fd! {
        name: "episode_num",
        ty: FieldType::String,
        desc: "Episode number",
        aliases: ["episode_number"],
        domains: [FieldDomain::Epg, FieldDomain::Filter, FieldDomain::Rule],
        read_only: false
    },
    fd! {
        name: "season_num",
        ty: FieldType::String,
        desc: "Season number",
        aliases: ["season_number"],
        domains: [FieldDomain::Epg, FieldDomain::Filter, FieldDomain::Rule],
        read_only: false
    },
    fd! {
        name: "start_time",
        ty: FieldType::DateTime,
        desc: "Programme start time",
        aliases: [],
        domains: [FieldDomain::Epg, FieldDomain::Filter],
        read_only: false
    },
    fd! {
        name: "end_time",
        ty: FieldType::DateTime,
        desc: "Programme end time",
        aliases: [],
        domains: [FieldDomain::Epg, FieldDomain::Filter],
        read_only: false
    },
    // ---------------------------
    // Request Context Fields (client detection; all read-only)
    // ---------------------------
    fd! {
        name: "client_ip",
        ty: FieldType::String,
        desc: "Client IP (X-Forwarded-For, X-Real-IP, then peer address)",
        aliases: [],
        domains: [FieldDomain::Request, FieldDomain::Filter],
        read_only: true
    },
    fd! {
        name: "request_path",
        ty: FieldType::String,
        desc: "Request path",
        aliases: [],
        domains: [FieldDomain::Request, FieldDomain::Filter],
        read_only: true
    },
    fd! {
        name: "request_url",
        ty: FieldType::String,
        desc: "Full request URL",
        aliases: [],
        domains: [FieldDomain::Request, FieldDomain::Filter],
        read_only: true
    },
    fd! {
        name: "query_params",
        ty: FieldType::String,
        desc: "Raw query string",
        aliases: [],
        domains: [FieldDomain::Request, FieldDomain::Filter],
        read_only: true
    },
    fd! {
        name: "method",
        ty: FieldType::String,
        desc: "HTTP method",
        aliases: [],
        domains: [FieldDomain::Request, FieldDomain::Filter],
        read_only: true
    },
    fd! {
        name: "host",
        ty: FieldType::String,
        desc: "Request host",
        aliases: [],
        domains: [FieldDomain::Request, FieldDomain::Filter],
        read_only: true
    },
];

/// Central registry object (immutable after init, safe for concurrent
/// reads).
pub struct FieldRegistry {
    definitions: &'static [FieldDefinition],
    by_name: HashMap<&'static str, &'static FieldDefinition>,
    alias_to_canonical: HashMap<&'static str, &'static str>,
    by_domain: HashMap<FieldDomain, Vec<&'static FieldDefinition>>,
    read_only: HashSet<&'static str>,
}

impl FieldRegistry {
    fn new() -> Self {
        let mut by_name = HashMap::new();
        let mut alias_to_canonical = HashMap::new();
        let mut by_domain: HashMap<FieldDomain, Vec<&'static FieldDefinition>> = HashMap::new();
        let mut read_only = HashSet::new();

        for d in FIELD_DEFINITIONS {
            by_name.insert(d.name, d);
            if d.read_only {
                read_only.insert(d.name);
            }
            for &alias in d.aliases {
                // If a duplicate alias appears, first one wins (deterministic definition).
                alias_to_canonical.entry(alias).or_insert(d.name);
            }
            for &dom in d.domains {
                by_domain.entry(dom).or_default().push(d);
            }
        }

        Self {
            definitions: FIELD_DEFINITIONS,
            by_name,
            alias_to_canonical,
            by_domain,
            read_only,
        }
    }

    /// Global singleton accessor.
    pub fn global() -> &'static Self {
        static REGISTRY: OnceLock<FieldRegistry> = OnceLock::new();
        REGISTRY.get_or_init(FieldRegistry::new)
    }

    /// Resolve a name to its canonical form. Canonical names and unknown
    /// names resolve to themselves; aliases resolve to their target.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        if self.by_name.contains_key(name) {
            name
        } else if let Some(canonical) = self.alias_to_canonical.get(name) {
            canonical
        } else {
            name
        }
    }

    /// Look up a definition by canonical name or alias.
    pub fn definition(&self, name: &str) -> Option<&'static FieldDefinition> {
        if let Some(d) = self.by_name.get(name) {
            return Some(d);
        }
        self.alias_to_canonical
            .get(name)
            .and_then(|canonical| self.by_name.get(canonical))
            .copied()
    }

    /// Domain legality check. Permissive: unknown names validate true so
    /// that runtime evaluation over ad-hoc accessors keeps working; known
    /// names must list the domain.
    pub fn validate_for_domain(&self, name: &str, domain: FieldDomain) -> bool {
        match self.definition(name) {
            Some(d) => d.domains.contains(&domain),
            None => true,
        }
    }

    /// Is this field (canonical or alias) read-only?
    pub fn is_read_only(&self, name: &str) -> bool {
        self.read_only.contains(self.resolve(name))
    }

    /// Definitions that are members of every one of the given domains.
    pub fn definitions_for(&self, domains: &[FieldDomain]) -> Vec<&'static FieldDefinition> {
        self.definitions
            .iter()
            .filter(|d| domains.iter().all(|dom| d.domains.contains(dom)))
            .collect()
    }

    /// Canonical field names for a single domain.
    pub fn field_names_for(&self, domain: FieldDomain) -> Vec<&'static str> {
        self.by_domain
            .get(&domain)
            .map(|defs| defs.iter().map(|d| d.name).collect())
            .unwrap_or_default()
    }

    /// Every canonical field name (sorted).
    pub fn all_canonical_fields(&self) -> Vec<&'static str> {
        let mut v: Vec<&'static str> = self.by_name.keys().copied().collect();
        v.sort_unstable();
        v
    }

    /// Produce a complete alias map clone (for validator injection).
    pub fn alias_map(&self) -> HashMap<String, String> {
        self.alias_to_canonical
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Convenience: test if a string is a known canonical field.
    pub fn is_canonical(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}
