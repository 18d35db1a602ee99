//! The prefix-matching command trie driving every vendor shell.
//!
//! Commands are registered as whitespace-tokenized keyword paths ending in
//! an action. Matching resolves unique keyword prefixes (`conf t` for
//! `configure terminal`), detects ambiguity, and distinguishes incomplete
//! paths from invalid tokens. Actions are plain function pointers taking an
//! explicit context, so no shell state is captured in the tree.

use std::collections::BTreeMap;

use crate::error::NetError;

/// An action handler: explicit context in, rendered output out.
pub type Handler<C> = fn(&mut C, &[String]) -> Result<String, NetError>;

struct TrieAction<C> {
    description: String,
    greedy: bool,
    handler: Handler<C>,
}

struct TrieNode<C> {
    children: BTreeMap<String, TrieNode<C>>,
    action: Option<TrieAction<C>>,
}

impl<C> TrieNode<C> {
    fn new() -> Self {
        Self {
            children: BTreeMap::new(),
            action: None,
        }
    }
}

/// How an input line resolved against the trie.
pub enum Resolution<C> {
    /// Unique resolution; `args` are the tokens beyond the action node.
    Match {
        handler: Handler<C>,
        args: Vec<String>,
    },
    /// A keyword prefix matched several siblings.
    Ambiguous { candidates: Vec<String> },
    /// A valid keyword path that does not reach an action.
    Incomplete { continuations: Vec<String> },
    /// First unknown token, by position.
    Invalid { position: usize },
}

/// One keyword completion with its command description (empty for pure
/// intermediate keywords).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub keyword: String,
    pub description: String,
}

pub struct CommandTrie<C> {
    root: TrieNode<C>,
}

impl<C> CommandTrie<C> {
    pub fn new() -> Self {
        Self {
            root: TrieNode::new(),
        }
    }

    /// Register a command path; the action receives whatever tokens remain
    /// after the keyword sequence.
    pub fn register(&mut self, path: &str, description: &str, handler: Handler<C>) {
        self.insert(path, description, false, handler);
    }

    /// Like `register`, but the action explicitly consumes free-form
    /// trailing arguments (hostname values, address lists).
    pub fn register_greedy(&mut self, path: &str, description: &str, handler: Handler<C>) {
        self.insert(path, description, true, handler);
    }

    fn insert(&mut self, path: &str, description: &str, greedy: bool, handler: Handler<C>) {
        let mut node = &mut self.root;
        for keyword in path.split_whitespace() {
            node = node
                .children
                .entry(keyword.to_string())
                .or_insert_with(TrieNode::new);
        }
        node.action = Some(TrieAction {
            description: description.to_string(),
            greedy,
            handler,
        });
    }

    /// Resolve a tokenized input line.
    pub fn resolve(&self, tokens: &[String]) -> Resolution<C> {
        let mut node = &self.root;
        for (i, token) in tokens.iter().enumerate() {
            // An exact keyword always wins over prefix candidates.
            if let Some(child) = node.children.get(token.as_str()) {
                node = child;
                continue;
            }
            let candidates: Vec<&String> = node
                .children
                .keys()
                .filter(|k| k.starts_with(token.as_str()))
                .collect();
            match candidates.len() {
                1 => {
                    node = &node.children[candidates[0].as_str()];
                }
                0 => {
                    if let Some(action) = &node.action {
                        if action.greedy || node.children.is_empty() {
                            return Resolution::Match {
                                handler: action.handler,
                                args: tokens[i..].to_vec(),
                            };
                        }
                    }
                    return Resolution::Invalid { position: i };
                }
                _ => {
                    return Resolution::Ambiguous {
                        candidates: candidates.into_iter().cloned().collect(),
                    }
                }
            }
        }
        match &node.action {
            Some(action) => Resolution::Match {
                handler: action.handler,
                args: Vec::new(),
            },
            None => Resolution::Incomplete {
                continuations: node.children.keys().cloned().collect(),
            },
        }
    }

    /// Walk complete tokens to a node, `None` on any miss or ambiguity.
    fn walk(&self, tokens: &[String]) -> Option<&TrieNode<C>> {
        let mut node = &self.root;
        for token in tokens {
            if let Some(child) = node.children.get(token.as_str()) {
                node = child;
                continue;
            }
            let candidates: Vec<&String> = node
                .children
                .keys()
                .filter(|k| k.starts_with(token.as_str()))
                .collect();
            if candidates.len() != 1 {
                return None;
            }
            node = &node.children[candidates[0].as_str()];
        }
        Some(node)
    }

    /// Tab completion: the longest unambiguous extension of the last token,
    /// or `None` when nothing (or more than one thing) fits.
    pub fn tab_complete(&self, tokens: &[String]) -> Option<String> {
        let (last, prefix_tokens) = tokens.split_last()?;
        let node = self.walk(prefix_tokens)?;
        let candidates: Vec<&String> = node
            .children
            .keys()
            .filter(|k| k.starts_with(last.as_str()))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        // Longest common prefix of every candidate.
        let mut lcp = candidates[0].to_string();
        for candidate in &candidates[1..] {
            while !candidate.starts_with(lcp.as_str()) {
                lcp.pop();
            }
        }
        (lcp.len() > last.len()).then_some(lcp)
    }

    /// Context help: the keywords (with descriptions) that may follow the
    /// given tokens. An exact final keyword lists what comes next; a partial
    /// one filters its siblings.
    pub fn completions(&self, tokens: &[String]) -> Vec<Completion> {
        let (node, filter) = match tokens.split_last() {
            None => (Some(&self.root), String::new()),
            Some((last, prefix_tokens)) => match self.walk(prefix_tokens) {
                None => (None, String::new()),
                Some(parent) => match parent.children.get(last.as_str()) {
                    Some(exact) => (Some(exact), String::new()),
                    None => (Some(parent), last.clone()),
                },
            },
        };
        let Some(node) = node else {
            return Vec::new();
        };
        node.children
            .iter()
            .filter(|(k, _)| k.starts_with(filter.as_str()))
            .map(|(k, child)| Completion {
                keyword: k.clone(),
                description: child
                    .action
                    .as_ref()
                    .map(|a| a.description.clone())
                    .unwrap_or_default(),
            })
            .collect()
    }
}

impl<C> Default for CommandTrie<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Ctx = Vec<String>;

    fn note(tag: &'static str) -> Handler<Ctx> {
        match tag {
            "enable" => |ctx: &mut Ctx, _args: &[String]| {
                ctx.push("enable".into());
                Ok("enable".into())
            },
            "version" => |ctx: &mut Ctx, _args: &[String]| {
                ctx.push("version".into());
                Ok("version".into())
            },
            "vlan" => |ctx: &mut Ctx, args: &[String]| {
                ctx.push(format!("vlan {}", args.join(" ")));
                Ok("vlan".into())
            },
            "configure" => |ctx: &mut Ctx, _args: &[String]| {
                ctx.push("configure terminal".into());
                Ok("configure".into())
            },
            _ => |_ctx: &mut Ctx, _args: &[String]| Ok(String::new()),
        }
    }

    fn sample_trie() -> CommandTrie<Ctx> {
        let mut trie = CommandTrie::new();
        trie.register("enable", "Turn on privileged commands", note("enable"));
        trie.register("show version", "System hardware and software status", note("version"));
        trie.register_greedy("show vlan", "VTP VLAN status", note("vlan"));
        trie.register("show running-config", "Current operating configuration", note("_"));
        trie.register("configure terminal", "Enter configuration mode", note("configure"));
        trie.register_greedy("hostname", "Set system's network name", note("_"));
        trie
    }

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_exact_match_executes() {
        let trie = sample_trie();
        let mut ctx = Vec::new();
        match trie.resolve(&toks("show version")) {
            Resolution::Match { handler, args } => {
                assert!(args.is_empty());
                handler(&mut ctx, &args).unwrap();
            }
            _ => panic!("expected a match"),
        }
        assert_eq!(ctx, vec!["version".to_string()]);
    }

    #[test]
    fn test_unique_prefix_resolves() {
        let trie = sample_trie();
        match trie.resolve(&toks("conf t")) {
            Resolution::Match { .. } => {}
            _ => panic!("'conf t' should resolve to 'configure terminal'"),
        }
        match trie.resolve(&toks("show ver")) {
            Resolution::Match { .. } => {}
            _ => panic!("'show ver' should resolve to 'show version'"),
        }
    }

    #[test]
    fn test_ambiguous_prefix_reports_candidates() {
        let trie = sample_trie();
        match trie.resolve(&toks("show v")) {
            Resolution::Ambiguous { candidates } => {
                assert_eq!(candidates, vec!["version".to_string(), "vlan".to_string()]);
            }
            _ => panic!("'show v' is ambiguous between version and vlan"),
        }
    }

    #[test]
    fn test_exact_keyword_beats_prefix_candidates() {
        let mut trie = sample_trie();
        // "show vlan" exists; an additional "show vlan-groups" must not make
        // the exact token "vlan" ambiguous.
        trie.register("show vlan-groups", "VLAN groups", note("_"));
        match trie.resolve(&toks("show vlan")) {
            Resolution::Match { .. } => {}
            _ => panic!("exact 'vlan' must win over 'vlan-groups'"),
        }
    }

    #[test]
    fn test_incomplete_reports_continuations() {
        let trie = sample_trie();
        match trie.resolve(&toks("show")) {
            Resolution::Incomplete { continuations } => {
                assert_eq!(
                    continuations,
                    vec![
                        "running-config".to_string(),
                        "version".to_string(),
                        "vlan".to_string()
                    ]
                );
            }
            _ => panic!("'show' alone is incomplete"),
        }
    }

    #[test]
    fn test_invalid_token_position() {
        let trie = sample_trie();
        match trie.resolve(&toks("show bogus")) {
            Resolution::Invalid { position } => assert_eq!(position, 1),
            _ => panic!("'bogus' is invalid at position 1"),
        }
        match trie.resolve(&toks("frobnicate")) {
            Resolution::Invalid { position } => assert_eq!(position, 0),
            _ => panic!("unknown first token"),
        }
    }

    #[test]
    fn test_greedy_action_consumes_trailing_args() {
        let trie = sample_trie();
        let mut ctx = Vec::new();
        match trie.resolve(&toks("show vlan brief")) {
            Resolution::Match { handler, args } => {
                assert_eq!(args, vec!["brief".to_string()]);
                handler(&mut ctx, &args).unwrap();
            }
            _ => panic!("greedy node takes trailing tokens"),
        }
        assert_eq!(ctx, vec!["vlan brief".to_string()]);
    }

    #[test]
    fn test_greedy_hostname_takes_value() {
        let trie = sample_trie();
        match trie.resolve(&toks("hostname SW-CORE-1")) {
            Resolution::Match { args, .. } => assert_eq!(args, vec!["SW-CORE-1".to_string()]),
            _ => panic!("hostname takes a free-form value"),
        }
    }

    #[test]
    fn test_tab_complete_extends_unambiguously() {
        let trie = sample_trie();
        assert_eq!(trie.tab_complete(&toks("en")), Some("enable".to_string()));
        assert_eq!(trie.tab_complete(&toks("show ver")), Some("version".to_string()));
        // 'show v' could be version or vlan: no unambiguous extension
        // beyond the common prefix 'v'.
        assert_eq!(trie.tab_complete(&toks("show v")), None);
        assert_eq!(trie.tab_complete(&toks("show x")), None);
    }

    #[test]
    fn test_tab_complete_common_prefix_partial_extension() {
        let mut trie: CommandTrie<Ctx> = CommandTrie::new();
        trie.register("show interfaces", "", note("_"));
        trie.register("show interface-capabilities", "", note("_"));
        // Both candidates share 'interface'; 'show int' extends to it.
        assert_eq!(
            trie.tab_complete(&toks("show int")),
            Some("interface".to_string())
        );
    }

    #[test]
    fn test_completions_list_keywords_and_descriptions() {
        let trie = sample_trie();
        let completions = trie.completions(&toks("show"));
        let keywords: Vec<&str> = completions.iter().map(|c| c.keyword.as_str()).collect();
        assert_eq!(keywords, vec!["running-config", "version", "vlan"]);
        let version = completions.iter().find(|c| c.keyword == "version").unwrap();
        assert_eq!(version.description, "System hardware and software status");
    }

    #[test]
    fn test_completions_filter_by_partial_token() {
        let trie = sample_trie();
        let completions = trie.completions(&toks("show r"));
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].keyword, "running-config");
    }
}
