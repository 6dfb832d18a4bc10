//! Tree loader protocol.
//!
//! Nodes are addressed as `<level>_<Model>_<id>`; children additionally carry a `?<token>`
//! suffix of three random characters so a record reached twice through a recursive level gets
//! two distinct node ids. Levels are configured per request in `tree_nodes`; an entry
//! `{go_to_level: n}` sends expansion back to level `n`.

use super::{parse_id, ExtApi};
use crate::error::{AppError, ConfigError};
use crate::options::{filter, from_value, OperationKind, Options};
use crate::path::{AttributePath, Resolved};
use crate::record::id_to_string;
use crate::session::{RecordKey, Session};
use crate::sort;
use crate::store::Query;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const TOKEN_LEN: usize = 3;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TreeLevelConfig {
    GoTo {
        #[serde(alias = "goToLevel")]
        go_to_level: usize,
    },
    Level {
        #[serde(default)]
        link: Option<String>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        cls: Option<String>,
    },
}

impl TreeLevelConfig {
    fn link(&self) -> Option<&str> {
        match self {
            TreeLevelConfig::Level { link, .. } => link.as_deref(),
            TreeLevelConfig::GoTo { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TreeNode {
    pub text: Value,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cls: Option<String>,
    pub leaf: bool,
}

/// A parsed node id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeRef {
    Root,
    Node { level: usize, model: String, id: String },
}

const NODE_ID_PATTERN: &str = r"^(\d+)_(\w+)_(\d+)(\?\w*)?$";

impl NodeRef {
    pub fn parse(node: &str) -> Result<Self, AppError> {
        if node.is_empty() || node == "root" {
            return Ok(NodeRef::Root);
        }
        let re = Regex::new(NODE_ID_PATTERN)
            .map_err(|e| AppError::Validation(format!("node id pattern: {}", e)))?;
        let caps = re
            .captures(node)
            .ok_or_else(|| AppError::Validation(format!("malformed node id '{}'", node)))?;
        let level = caps[1]
            .parse()
            .map_err(|_| AppError::Validation(format!("malformed node level in '{}'", node)))?;
        Ok(NodeRef::Node {
            level,
            model: caps[2].to_string(),
            id: caps[3].to_string(),
        })
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Root => f.write_str("root"),
            NodeRef::Node { level, model, id } => write!(f, "{}_{}_{}", level, model, id),
        }
    }
}

fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Level configuration for one request.
struct Levels(Vec<TreeLevelConfig>);

impl Levels {
    fn get(&self, level: usize) -> Option<&TreeLevelConfig> {
        self.0.get(level)
    }

    /// Target of the entry after `level`, when that entry is a redirect.
    fn next_level_is_goto(&self, level: usize) -> Option<usize> {
        match self.get(level + 1) {
            Some(TreeLevelConfig::GoTo { go_to_level }) => Some(*go_to_level),
            _ => None,
        }
    }

    /// `(link, text, cls)` of a plain level.
    fn expand(&self, level: usize) -> Result<(&str, &str, Option<&str>), ConfigError> {
        match self.get(level) {
            Some(TreeLevelConfig::Level { link, text, cls }) => {
                let link = link.as_deref().ok_or(ConfigError::MissingLink(level))?;
                let text = text.as_deref().ok_or(ConfigError::MissingText(level))?;
                Ok((link, text, cls.as_deref()))
            }
            _ => Err(ConfigError::TreeLevel(level)),
        }
    }
}

impl ExtApi {
    /// Children of `node` (`root` or empty for the top level).
    pub async fn get_nodes(&self, node: &str, opts: Options) -> Result<Vec<TreeNode>, AppError> {
        let opts = filter(OperationKind::Tree, opts);
        let levels = match opts.get("tree_nodes") {
            None | Some(Value::Null) => return Err(ConfigError::MissingTreeNodes.into()),
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| ConfigError::Validation(format!("tree_nodes: {}", e)))?,
        };
        let levels = Levels(levels);
        let mut session = self.session();
        match NodeRef::parse(node)? {
            NodeRef::Root => {
                let root_options = opts.get("root_options").cloned().map(from_value).unwrap_or_default();
                self.root_nodes(&mut session, &levels, root_options).await
            }
            NodeRef::Node { level, model, id } => {
                self.child_nodes(&mut session, &levels, level, &model, &id).await
            }
        }
    }

    async fn root_nodes(
        &self,
        session: &mut Session,
        levels: &Levels,
        root_options: Options,
    ) -> Result<Vec<TreeNode>, AppError> {
        let (text, cls) = match levels.get(0) {
            Some(TreeLevelConfig::Level { text: Some(text), cls, .. }) => (text.as_str(), cls.clone()),
            _ => return Err(ConfigError::MissingText(0).into()),
        };
        let query = Query::from_options(&sort::translate(filter(OperationKind::Read, root_options))?)?;
        let text_path = AttributePath::parse(text);
        let leaf = levels.get(1).is_none();

        let mut nodes = Vec::new();
        for key in session.find_all(&self.model, &query).await? {
            let label = session.resolve(key, text_path.segments(), None).await?;
            let id = session.id(key).map(|v| id_to_string(&v)).unwrap_or_default();
            nodes.push(TreeNode {
                text: session.to_json(&label),
                id: format!("0_{}_{}", self.model, id),
                cls: cls.clone(),
                leaf,
            });
        }
        Ok(nodes)
    }

    async fn child_nodes(
        &self,
        session: &mut Session,
        levels: &Levels,
        parent_level: usize,
        model: &str,
        id: &str,
    ) -> Result<Vec<TreeNode>, AppError> {
        let mut level = parent_level
            .checked_add(1)
            .ok_or(ConfigError::TreeLevel(parent_level))?;
        match levels.get(level) {
            None => return Err(ConfigError::TreeLevel(level).into()),
            Some(TreeLevelConfig::GoTo { go_to_level }) => level = *go_to_level,
            Some(TreeLevelConfig::Level { .. }) => {}
        }
        let (link, text, cls) = levels.expand(level)?;
        // A recursive level is a leaf once the redirect target's collection is empty.
        let lookahead = match levels.next_level_is_goto(level) {
            Some(target) => Some(
                levels
                    .get(target)
                    .and_then(TreeLevelConfig::link)
                    .ok_or(ConfigError::MissingLink(target))?,
            ),
            None => None,
        };

        let parent_model = session.schema().model(model)?;
        let parent_id = parse_id(id, &parent_model.pk_type)?;
        let parent = session.get(model, &parent_id).await?;
        let linked = session
            .resolve(parent, AttributePath::parse(link).segments(), None)
            .await?;
        if let Resolved::Value(_) = linked {
            return Err(AppError::Invocation(format!(
                "tree link '{}' of level {} is not an association of {}",
                link, level, model
            )));
        }
        let text_path = AttributePath::parse(text);

        let mut nodes = Vec::new();
        for key in linked.records() {
            let label = session.resolve(key, text_path.segments(), None).await?;
            let leaf = match lookahead {
                Some(link) => !has_children(session, key, link).await?,
                None => levels.get(level + 1).is_none(),
            };
            let child_model = session.record(key).model().to_string();
            let child_id = session.id(key).map(|v| id_to_string(&v)).unwrap_or_default();
            nodes.push(TreeNode {
                text: session.to_json(&label),
                id: format!("{}_{}_{}?{}", level, child_model, child_id, random_token()),
                cls: cls.map(String::from),
                leaf,
            });
        }
        Ok(nodes)
    }
}

async fn has_children(session: &mut Session, key: RecordKey, link: &str) -> Result<bool, AppError> {
    let children = session
        .resolve(key, AttributePath::parse(link).segments(), None)
        .await?;
    Ok(match children {
        Resolved::Value(v) => !v.is_null(),
        other => !other.records().is_empty(),
    })
}
