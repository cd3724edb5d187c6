//! core::naming
//!
//! Module naming rules and dependency-specifier resolution.
//!
//! # Specifier grammar
//!
//! ```text
//! specifier := (handler DELIMITER)* path
//! path      := ["/" | "./" | ("../")+] segment ("/" segment)* (ACCESSOR property)*
//! ```
//!
//! (`/`, `.` and `!` are the default separator, accessor and delimiter;
//! all three are configurable through [`NamingTokens`].)
//!
//! - A leading separator names a child of the declaring module.
//! - A leading `./` names a sibling of the declaring module.
//! - Each leading `../` walks one more level up.
//! - Properties after the accessor select a fragment of the producer's value.
//! - Handler prefixes hand the dependency to a registered extension.
//!   They are applied in reverse: the prefix written closest to the name
//!   runs first. Fragments are never parsed for handled dependencies.
//!
//! An empty accessor turns fragment parsing off, so `a.b` is a plain name.
//! An empty separator turns the relative forms off and names are flat.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::ModuleName;

/// Marker for relative specifiers (`./x`, `../x`).
pub const RELATIVE_MARKER: &str = ".";

/// Label used for anonymous modules in messages.
pub const ANONYMOUS: &str = "<anonymous>";

/// Errors from name validation and specifier parsing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("module names cannot be empty")]
    EmptyModuleName,

    #[error("module names cannot be relative (they can't start with \".\"), the culprit: \"{name}\"")]
    RelativeModuleName { name: String },

    #[error("module names cannot start or end with \"{separator}\", the culprit: \"{name}\"")]
    SeparatorBoundary { name: String, separator: String },

    #[error("module names cannot contain \"{accessor}\", the culprit: \"{name}\"")]
    ContainsAccessor { name: String, accessor: String },

    #[error("module names cannot contain the handler delimiter \"{delimiter}\", the culprit: \"{name}\"")]
    ContainsDelimiter { name: String, delimiter: String },

    #[error("module \"{module}\": dependency \"{specifier}\" resolves to an empty name")]
    EmptyDependency { module: String, specifier: String },

    #[error("module \"{module}\": dependency \"{specifier}\" cannot end with \"{separator}\"")]
    TrailingSeparator {
        module: String,
        specifier: String,
        separator: String,
    },

    #[error("module \"{module}\": dependency \"{specifier}\" uses \"{accessor}\" outside its last path segment")]
    AccessorInPath {
        module: String,
        specifier: String,
        accessor: String,
    },

    #[error("module \"{module}\": dependency \"{specifier}\" has an empty fragment property")]
    EmptyFragment { module: String, specifier: String },

    #[error("module \"{module}\": dependency \"{specifier}\" has an empty handler prefix")]
    EmptyHandlerPrefix { module: String, specifier: String },

    #[error("module \"{module}\": dependency \"{specifier}\" uses unregistered handler \"{handler}\"")]
    UnregisteredHandler {
        module: String,
        specifier: String,
        handler: String,
    },

    #[error("anonymous modules cannot use relative dependency \"{specifier}\"")]
    RelativeFromAnonymous { specifier: String },

    #[error("invalid naming tokens: {0}")]
    InvalidTokens(String),
}

/// The configurable tokens of the specifier grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingTokens {
    /// Path separator (default `/`).
    pub separator: String,
    /// Fragment accessor (default `.`).
    pub accessor: String,
    /// Handler-prefix delimiter (default `!`).
    pub delimiter: String,
}

impl Default for NamingTokens {
    fn default() -> Self {
        Self {
            separator: "/".to_string(),
            accessor: ".".to_string(),
            delimiter: "!".to_string(),
        }
    }
}

impl NamingTokens {
    /// Check that the tokens can be told apart.
    ///
    /// # Example
    ///
    /// ```
    /// use wireloom::core::naming::NamingTokens;
    ///
    /// assert!(NamingTokens::default().validate().is_ok());
    ///
    /// let clash = NamingTokens {
    ///     separator: ".".to_string(),
    ///     ..NamingTokens::default()
    /// };
    /// assert!(clash.validate().is_err());
    ///
    /// let flat = NamingTokens {
    ///     separator: String::new(),
    ///     accessor: String::new(),
    ///     ..NamingTokens::default()
    /// };
    /// assert!(flat.validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), NameError> {
        if self.delimiter.is_empty() {
            return Err(NameError::InvalidTokens("delimiter cannot be empty".to_string()));
        }
        let named = [
            ("separator", &self.separator),
            ("accessor", &self.accessor),
            ("delimiter", &self.delimiter),
        ];
        for (i, (a_label, a)) in named.iter().enumerate() {
            for (b_label, b) in &named[i + 1..] {
                if !a.is_empty() && a == b {
                    return Err(NameError::InvalidTokens(format!(
                        "{} and {} cannot be the same (\"{}\")",
                        a_label, b_label, a
                    )));
                }
            }
        }
        if self.separator.starts_with(RELATIVE_MARKER) || self.delimiter.starts_with(RELATIVE_MARKER)
        {
            return Err(NameError::InvalidTokens(format!(
                "separator and delimiter cannot start with the relative marker \"{}\"",
                RELATIVE_MARKER
            )));
        }
        Ok(())
    }
}

/// A parsed dependency specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    /// The specifier as written.
    pub raw: String,
    /// Position in the declaring module's dependency list.
    pub index: usize,
    /// Canonical target: handler prefixes (as written) plus the resolved base.
    pub target: ModuleName,
    /// The resolved name without handler prefixes.
    pub base: String,
    /// Handler prefixes in application order (innermost first).
    pub handlers: Vec<String>,
    /// Property path to extract from the producer's value.
    pub fragment: Option<Vec<String>>,
}

impl DependencySpec {
    /// Whether the dependency is resolved by extensions.
    pub fn is_custom(&self) -> bool {
        !self.handlers.is_empty()
    }
}

/// Resolves module names and dependency specifiers.
#[derive(Debug, Clone, Default)]
pub struct NameResolver {
    tokens: NamingTokens,
}

impl NameResolver {
    pub fn new(tokens: NamingTokens) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &NamingTokens {
        &self.tokens
    }

    /// Validate a name used to declare a module.
    ///
    /// # Example
    ///
    /// ```
    /// use wireloom::core::naming::NameResolver;
    ///
    /// let resolver = NameResolver::default();
    /// assert!(resolver.module_name("app/main").is_ok());
    /// assert!(resolver.module_name("").is_err());
    /// assert!(resolver.module_name("./app").is_err());
    /// assert!(resolver.module_name("app/").is_err());
    /// assert!(resolver.module_name("app.main").is_err());
    /// assert!(resolver.module_name("text!app").is_err());
    /// ```
    pub fn module_name(&self, name: &str) -> Result<ModuleName, NameError> {
        let NamingTokens {
            separator,
            accessor,
            delimiter,
        } = &self.tokens;

        if name.is_empty() {
            return Err(NameError::EmptyModuleName);
        }
        if name.starts_with(RELATIVE_MARKER) {
            return Err(NameError::RelativeModuleName { name: name.into() });
        }
        if !separator.is_empty()
            && (name.starts_with(separator.as_str()) || name.ends_with(separator.as_str()))
        {
            return Err(NameError::SeparatorBoundary {
                name: name.into(),
                separator: separator.clone(),
            });
        }
        if !accessor.is_empty() && name.contains(accessor.as_str()) {
            return Err(NameError::ContainsAccessor {
                name: name.into(),
                accessor: accessor.clone(),
            });
        }
        if name.contains(delimiter.as_str()) {
            return Err(NameError::ContainsDelimiter {
                name: name.into(),
                delimiter: delimiter.clone(),
            });
        }
        Ok(ModuleName::canonical(name))
    }

    /// Parse a dependency specifier declared by `owner` (`None` for
    /// anonymous modules).
    ///
    /// `is_handler` reports whether a prefix is registered.
    ///
    /// # Example
    ///
    /// ```
    /// use wireloom::core::naming::NameResolver;
    ///
    /// let resolver = NameResolver::default();
    /// let owner = resolver.module_name("one/a/1").unwrap();
    /// let no_handlers = |_: &str| false;
    ///
    /// let dep = resolver.resolve(Some(&owner), "../b/1", 0, no_handlers).unwrap();
    /// assert_eq!(dep.target.as_str(), "one/b/1");
    ///
    /// let dep = resolver.resolve(Some(&owner), "config.db.url", 1, no_handlers).unwrap();
    /// assert_eq!(dep.target.as_str(), "config");
    /// assert_eq!(dep.fragment, Some(vec!["db".to_string(), "url".to_string()]));
    /// ```
    pub fn resolve(
        &self,
        owner: Option<&ModuleName>,
        specifier: &str,
        index: usize,
        is_handler: impl Fn(&str) -> bool,
    ) -> Result<DependencySpec, NameError> {
        let NamingTokens {
            separator,
            accessor,
            delimiter,
        } = &self.tokens;
        let module = owner.map(ModuleName::as_str).unwrap_or(ANONYMOUS).to_string();

        let mut parts: Vec<&str> = specifier.split(delimiter.as_str()).collect();
        let name = parts.pop().unwrap_or_default();
        let written_prefixes = parts;

        if name.is_empty() {
            return Err(NameError::EmptyDependency {
                module,
                specifier: specifier.into(),
            });
        }
        if !separator.is_empty() && name.ends_with(separator.as_str()) {
            return Err(NameError::TrailingSeparator {
                module,
                specifier: specifier.into(),
                separator: separator.clone(),
            });
        }
        for prefix in &written_prefixes {
            if prefix.is_empty() {
                return Err(NameError::EmptyHandlerPrefix {
                    module,
                    specifier: specifier.into(),
                });
            }
            if !is_handler(prefix) {
                return Err(NameError::UnregisteredHandler {
                    module,
                    specifier: specifier.into(),
                    handler: (*prefix).to_string(),
                });
            }
        }

        let base = self.resolve_relative(owner, name, specifier)?;
        if base.is_empty() {
            return Err(NameError::EmptyDependency {
                module,
                specifier: specifier.into(),
            });
        }
        if !separator.is_empty() && base.ends_with(separator.as_str()) {
            return Err(NameError::TrailingSeparator {
                module,
                specifier: specifier.into(),
                separator: separator.clone(),
            });
        }

        if !written_prefixes.is_empty() {
            let mut target = written_prefixes.join(delimiter.as_str());
            target.push_str(delimiter);
            target.push_str(&base);
            return Ok(DependencySpec {
                raw: specifier.into(),
                index,
                target: ModuleName::canonical(target),
                base,
                handlers: written_prefixes.iter().rev().map(|p| p.to_string()).collect(),
                fragment: None,
            });
        }

        if accessor.is_empty() {
            return Ok(DependencySpec {
                raw: specifier.into(),
                index,
                target: ModuleName::canonical(base.clone()),
                base,
                handlers: Vec::new(),
                fragment: None,
            });
        }

        // Fragments only live in the last path segment.
        let split_at = if separator.is_empty() {
            None
        } else {
            base.rfind(separator.as_str())
        };
        let (path, last) = match split_at {
            Some(pos) => (&base[..pos], &base[pos + separator.len()..]),
            None => ("", base.as_str()),
        };
        if path.contains(accessor.as_str()) {
            return Err(NameError::AccessorInPath {
                module,
                specifier: specifier.into(),
                accessor: accessor.clone(),
            });
        }
        let mut properties = last.split(accessor.as_str());
        let head = properties.next().unwrap_or_default();
        let fragment: Vec<String> = properties.map(str::to_string).collect();
        if head.is_empty() {
            return Err(NameError::EmptyDependency {
                module,
                specifier: specifier.into(),
            });
        }
        if fragment.iter().any(String::is_empty) {
            return Err(NameError::EmptyFragment {
                module,
                specifier: specifier.into(),
            });
        }

        let target = if path.is_empty() {
            head.to_string()
        } else {
            format!("{}{}{}", path, separator, head)
        };

        Ok(DependencySpec {
            raw: specifier.into(),
            index,
            target: ModuleName::canonical(target),
            base,
            handlers: Vec::new(),
            fragment: if fragment.is_empty() {
                None
            } else {
                Some(fragment)
            },
        })
    }

    /// Resolve `/child`, `./sibling` and `../up` forms against the owner.
    fn resolve_relative(
        &self,
        owner: Option<&ModuleName>,
        name: &str,
        specifier: &str,
    ) -> Result<String, NameError> {
        let sep = self.tokens.separator.as_str();
        if sep.is_empty() {
            return Ok(name.to_string());
        }
        let sibling = format!("{}{}", RELATIVE_MARKER, sep);
        let parent = format!("{}{}{}", RELATIVE_MARKER, RELATIVE_MARKER, sep);

        let is_child = name.starts_with(sep);
        let is_relative = name.starts_with(&sibling) || name.starts_with(&parent);
        if !is_child && !is_relative {
            return Ok(name.to_string());
        }

        let owner = owner.ok_or_else(|| NameError::RelativeFromAnonymous {
            specifier: specifier.into(),
        })?;

        if is_child {
            return Ok(format!("{}{}", owner.as_str(), name));
        }

        let mut path: Vec<&str> = owner.as_str().split(sep).collect();
        path.pop();

        let rest = if let Some(rest) = name.strip_prefix(&sibling) {
            rest
        } else {
            let mut rest = name;
            while let Some(stripped) = rest.strip_prefix(&parent) {
                path.pop();
                rest = stripped;
            }
            rest
        };

        if path.is_empty() {
            Ok(rest.to_string())
        } else {
            Ok(format!("{}{}{}", path.join(sep), sep, rest))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> NameResolver {
        NameResolver::default()
    }

    fn owner(name: &str) -> ModuleName {
        resolver().module_name(name).unwrap()
    }

    fn none(_: &str) -> bool {
        false
    }

    fn target(owner_name: &str, specifier: &str) -> String {
        resolver()
            .resolve(Some(&owner(owner_name)), specifier, 0, none)
            .unwrap()
            .target
            .to_string()
    }

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(target("app", "db"), "db");
        assert_eq!(target("app", "lib/db"), "lib/db");
    }

    #[test]
    fn child_specifier_appends_to_owner() {
        assert_eq!(target("module", "/submodule"), "module/submodule");
        assert_eq!(target("one/a", "/b"), "one/a/b");
    }

    #[test]
    fn sibling_specifier_uses_parent_path() {
        assert_eq!(target("one/a", "./b"), "one/b");
        assert_eq!(target("dependency4/a", "./b"), "dependency4/b");
    }

    #[test]
    fn sibling_of_top_level_module_is_top_level() {
        assert_eq!(target("a", "./b"), "b");
    }

    #[test]
    fn parent_specifier_walks_up() {
        assert_eq!(target("one/a/1", "../b/1"), "one/b/1");
        assert_eq!(target("one/a/1", "../../two"), "two");
    }

    #[test]
    fn parent_walk_clamps_at_root() {
        assert_eq!(target("a", "../../../b"), "b");
    }

    #[test]
    fn fragment_is_split_from_last_segment() {
        let dep = resolver()
            .resolve(Some(&owner("app")), "lib/store.x.y", 3, none)
            .unwrap();
        assert_eq!(dep.target.as_str(), "lib/store");
        assert_eq!(dep.index, 3);
        assert_eq!(dep.fragment, Some(vec!["x".to_string(), "y".to_string()]));
        assert!(!dep.is_custom());
    }

    #[test]
    fn fragment_combines_with_relative_forms() {
        let dep = resolver()
            .resolve(Some(&owner("one/a")), "./b.value", 0, none)
            .unwrap();
        assert_eq!(dep.target.as_str(), "one/b");
        assert_eq!(dep.fragment, Some(vec!["value".to_string()]));
    }

    #[test]
    fn accessor_outside_last_segment_is_rejected() {
        let err = resolver()
            .resolve(Some(&owner("app")), "lib.v1/store", 0, none)
            .unwrap_err();
        assert!(matches!(err, NameError::AccessorInPath { .. }));
    }

    #[test]
    fn empty_fragment_property_is_rejected() {
        let err = resolver()
            .resolve(Some(&owner("app")), "store.", 0, none)
            .unwrap_err();
        assert!(matches!(err, NameError::EmptyFragment { .. }));
    }

    #[test]
    fn empty_and_trailing_separator_are_rejected() {
        let r = resolver();
        let app = owner("app");
        assert!(matches!(
            r.resolve(Some(&app), "", 0, none),
            Err(NameError::EmptyDependency { .. })
        ));
        assert!(matches!(
            r.resolve(Some(&app), "lib/", 0, none),
            Err(NameError::TrailingSeparator { .. })
        ));
        assert!(matches!(
            r.resolve(Some(&app), "../", 0, none),
            Err(NameError::TrailingSeparator { .. })
        ));
    }

    #[test]
    fn handler_prefixes_apply_in_reverse() {
        let registered = |p: &str| p == "text" || p == "const";
        let dep = resolver()
            .resolve(Some(&owner("app")), "text!const!greeting.en", 0, registered)
            .unwrap();
        assert_eq!(dep.target.as_str(), "text!const!greeting.en");
        assert_eq!(dep.base, "greeting.en");
        assert_eq!(dep.handlers, vec!["const".to_string(), "text".to_string()]);
        assert_eq!(dep.fragment, None);
        assert!(dep.is_custom());
    }

    #[test]
    fn handler_prefix_with_relative_name() {
        let registered = |p: &str| p == "text";
        let dep = resolver()
            .resolve(Some(&owner("views/home")), "text!./home.html", 0, registered)
            .unwrap();
        assert_eq!(dep.target.as_str(), "text!views/home.html");
    }

    #[test]
    fn unregistered_and_empty_handlers_are_rejected() {
        let r = resolver();
        let app = owner("app");
        assert!(matches!(
            r.resolve(Some(&app), "nope!thing", 0, none),
            Err(NameError::UnregisteredHandler { handler, .. }) if handler == "nope"
        ));
        assert!(matches!(
            r.resolve(Some(&app), "!thing", 0, none),
            Err(NameError::EmptyHandlerPrefix { .. })
        ));
    }

    #[test]
    fn anonymous_modules_cannot_use_relative_forms() {
        let r = resolver();
        assert!(matches!(
            r.resolve(None, "./b", 0, none),
            Err(NameError::RelativeFromAnonymous { .. })
        ));
        assert!(r.resolve(None, "b", 0, none).is_ok());
    }

    #[test]
    fn errors_name_module_and_specifier() {
        let err = resolver()
            .resolve(Some(&owner("app")), "lib/", 0, none)
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("app"));
        assert!(message.contains("lib/"));
    }

    #[test]
    fn module_name_rules() {
        let r = resolver();
        assert_eq!(r.module_name(""), Err(NameError::EmptyModuleName));
        assert!(matches!(
            r.module_name(".hidden"),
            Err(NameError::RelativeModuleName { .. })
        ));
        assert!(matches!(
            r.module_name("/abs"),
            Err(NameError::SeparatorBoundary { .. })
        ));
        assert!(matches!(
            r.module_name("a.b"),
            Err(NameError::ContainsAccessor { .. })
        ));
        assert!(matches!(
            r.module_name("a!b"),
            Err(NameError::ContainsDelimiter { .. })
        ));
    }

    #[test]
    fn custom_tokens() {
        let tokens = NamingTokens {
            separator: "::".to_string(),
            accessor: "#".to_string(),
            delimiter: "@".to_string(),
        };
        tokens.validate().unwrap();
        let r = NameResolver::new(tokens);
        let app = r.module_name("one::a").unwrap();
        let dep = r.resolve(Some(&app), ".::b#x", 0, none).unwrap();
        assert_eq!(dep.target.as_str(), "one::b");
        assert_eq!(dep.fragment, Some(vec!["x".to_string()]));
        // the default accessor is an ordinary character now
        assert!(r.module_name("a.b").is_ok());
    }

    #[test]
    fn empty_accessor_disables_fragments() {
        let tokens = NamingTokens {
            accessor: String::new(),
            ..NamingTokens::default()
        };
        tokens.validate().unwrap();
        let r = NameResolver::new(tokens);

        assert!(r.module_name("module.name").is_ok());
        let app = r.module_name("module1").unwrap();
        let dep = r
            .resolve(Some(&app), "module.sans.fragments", 0, none)
            .unwrap();
        assert_eq!(dep.target.as_str(), "module.sans.fragments");
        assert_eq!(dep.fragment, None);

        // relative forms still work
        let dep = r.resolve(Some(&owner("one/a")), "./b.c", 0, none).unwrap();
        assert_eq!(dep.target.as_str(), "one/b.c");
    }

    #[test]
    fn empty_separator_disables_relative_forms() {
        let tokens = NamingTokens {
            separator: String::new(),
            ..NamingTokens::default()
        };
        tokens.validate().unwrap();
        let r = NameResolver::new(tokens);

        let app = r.module_name("module2").unwrap();
        assert_eq!(
            r.resolve(Some(&app), "/child", 0, none).unwrap().target.as_str(),
            "/child"
        );
        assert!(r.module_name("a/b/").is_ok());

        // fragments still split on the whole name
        let dep = r.resolve(Some(&app), "config.db", 0, none).unwrap();
        assert_eq!(dep.target.as_str(), "config");
        assert_eq!(dep.fragment, Some(vec!["db".to_string()]));
    }

    #[test]
    fn tokens_must_be_distinct_and_delimited() {
        let empty = NamingTokens {
            delimiter: String::new(),
            ..NamingTokens::default()
        };
        assert!(empty.validate().is_err());

        let both_empty = NamingTokens {
            separator: String::new(),
            accessor: String::new(),
            ..NamingTokens::default()
        };
        assert!(both_empty.validate().is_ok());

        let same = NamingTokens {
            delimiter: "/".to_string(),
            ..NamingTokens::default()
        };
        assert!(same.validate().is_err());
    }
}
