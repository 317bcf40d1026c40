//! Runtime profiles and profile expressions.

use std::collections::{BTreeMap, HashSet};

use super::binder::Binder;
use super::ConfigDataError;

pub(crate) const ACTIVE_PROFILES: &str = "profiles.active";
pub(crate) const DEFAULT_PROFILES: &str = "profiles.default";
pub(crate) const INCLUDE_PROFILES: &str = "profiles.include";
pub(crate) const PROFILE_GROUP_PREFIX: &str = "profiles.group.";

const DEFAULT_PROFILE: &str = "default";

/// The active and default profiles, after group expansion.
///
/// Both lists are ordered and free of duplicates; the first occurrence of a
/// profile wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profiles {
    groups: BTreeMap<String, Vec<String>>,
    active: Vec<String>,
    default: Vec<String>,
}

impl Profiles {
    /// Creates profiles from explicit lists without any groups.
    pub fn new<A, D>(active: A, default: D) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            groups: BTreeMap::new(),
            active: dedup(active.into_iter().map(Into::into)),
            default: dedup(default.into_iter().map(Into::into)),
        }
    }

    /// Binds profiles from `binder`.
    ///
    /// `additional` profiles come first, followed by `profiles.active`.
    /// `profiles.default` falls back to `default` when unbound. Groups declared
    /// under `profiles.group.<name>` are expanded depth-first.
    pub(crate) fn bind(
        binder: &Binder,
        additional: impl IntoIterator<Item = String>,
    ) -> Result<Self, ConfigDataError> {
        let mut groups = BTreeMap::new();
        for key in binder.keys_with_prefix(PROFILE_GROUP_PREFIX) {
            let name = key[PROFILE_GROUP_PREFIX.len()..].to_string();
            if let Some(members) = binder.bind_string_list(&key)? {
                groups.insert(name, members);
            }
        }

        let mut active: Vec<String> = additional.into_iter().collect();
        active.extend(binder.bind_string_list(ACTIVE_PROFILES)?.unwrap_or_default());
        let default = binder
            .bind_string_list(DEFAULT_PROFILES)?
            .unwrap_or_else(|| vec![DEFAULT_PROFILE.to_string()]);

        validate(&active)?;
        validate(&default)?;

        let active = expand(&groups, active);
        let default = expand(&groups, default);
        Ok(Self {
            groups,
            active,
            default,
        })
    }

    pub fn active(&self) -> &[String] {
        &self.active
    }

    pub fn default(&self) -> &[String] {
        &self.default
    }

    pub fn groups(&self) -> &BTreeMap<String, Vec<String>> {
        &self.groups
    }

    /// The active profiles, or the default ones when nothing is active.
    pub fn accepted(&self) -> &[String] {
        if self.active.is_empty() {
            &self.default
        } else {
            &self.active
        }
    }

    pub fn is_accepted(&self, profile: &str) -> bool {
        self.accepted().iter().any(|p| p == profile)
    }
}

fn dedup(profiles: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    profiles
        .into_iter()
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

fn expand(groups: &BTreeMap<String, Vec<String>>, profiles: Vec<String>) -> Vec<String> {
    let mut stack: Vec<String> = profiles.into_iter().rev().collect();
    let mut seen = HashSet::new();
    let mut expanded = Vec::new();
    while let Some(current) = stack.pop() {
        if seen.insert(current.clone()) {
            if let Some(members) = groups.get(&current) {
                stack.extend(members.iter().rev().cloned());
            }
            expanded.push(current);
        }
    }
    expanded
}

fn validate(profiles: &[String]) -> Result<(), ConfigDataError> {
    for profile in profiles {
        let valid = !profile.is_empty()
            && !profile.starts_with(['-', '_'])
            && !profile.ends_with(['-', '_'])
            && profile
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(ConfigDataError::InvalidProfileName(profile.clone()));
        }
    }
    Ok(())
}

/// A parsed profile expression such as `prod & !cloud` or `(dev | test)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileExpression {
    Profile(String),
    Not(Box<ProfileExpression>),
    And(Vec<ProfileExpression>),
    Or(Vec<ProfileExpression>),
}

impl ProfileExpression {
    pub fn parse(expression: &str) -> Result<Self, ConfigDataError> {
        let tokens = tokenize(expression);
        let mut parser = Parser {
            expression,
            tokens: &tokens,
            pos: 0,
        };
        let parsed = parser.parse_expression()?;
        if parser.pos != tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(parsed)
    }

    pub fn matches(&self, profiles: &Profiles) -> bool {
        match self {
            Self::Profile(name) => profiles.is_accepted(name),
            Self::Not(inner) => !inner.matches(profiles),
            Self::And(all) => all.iter().all(|e| e.matches(profiles)),
            Self::Or(any) => any.iter().any(|e| e.matches(profiles)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Name(String),
    Not,
    And,
    Or,
    Open,
    Close,
}

fn tokenize(expression: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut name = String::new();
    for c in expression.chars() {
        let token = match c {
            '!' => Some(Token::Not),
            '&' => Some(Token::And),
            '|' => Some(Token::Or),
            '(' => Some(Token::Open),
            ')' => Some(Token::Close),
            c if c.is_whitespace() => None,
            c => {
                name.push(c);
                continue;
            }
        };
        if !name.is_empty() {
            tokens.push(Token::Name(std::mem::take(&mut name)));
        }
        tokens.extend(token);
    }
    if !name.is_empty() {
        tokens.push(Token::Name(name));
    }
    tokens
}

struct Parser<'a> {
    expression: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn parse_expression(&mut self) -> Result<ProfileExpression, ConfigDataError> {
        let first = self.parse_unary()?;
        let operator = match self.tokens.get(self.pos) {
            Some(Token::And) => Token::And,
            Some(Token::Or) => Token::Or,
            _ => return Ok(first),
        };

        let mut operands = vec![first];
        while let Some(token) = self.tokens.get(self.pos) {
            match token {
                Token::And | Token::Or if *token == operator => {
                    self.pos += 1;
                    operands.push(self.parse_unary()?);
                }
                Token::And | Token::Or => {
                    return Err(self.error("mixing '&' and '|' requires parentheses"))
                }
                _ => break,
            }
        }

        Ok(match operator {
            Token::And => ProfileExpression::And(operands),
            _ => ProfileExpression::Or(operands),
        })
    }

    fn parse_unary(&mut self) -> Result<ProfileExpression, ConfigDataError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| self.error("expected a profile name"))?;
        self.pos += 1;
        match token {
            Token::Name(name) => Ok(ProfileExpression::Profile(name)),
            Token::Not => Ok(ProfileExpression::Not(Box::new(self.parse_unary()?))),
            Token::Open => {
                let inner = self.parse_expression()?;
                if self.tokens.get(self.pos) != Some(&Token::Close) {
                    return Err(self.error("missing ')'"));
                }
                self.pos += 1;
                Ok(inner)
            }
            _ => Err(self.error("expected a profile name")),
        }
    }

    fn error(&self, reason: &str) -> ConfigDataError {
        ConfigDataError::InvalidProfileExpression {
            expression: self.expression.to_string(),
            reason: reason.to_string(),
        }
    }
}
