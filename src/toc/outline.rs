use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_HEADING_MARKER: char = '=';

/// A single heading in an outline.
///
/// `level` is the depth after normalisation, `raw_level` is the marker count
/// found in the source text. The change flags start out false and are set by
/// the assembler when the outline is compared to the previous retained one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionNode {
    pub title: String,
    pub level: usize,
    pub raw_level: usize,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub is_renamed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_title: Option<String>,
}

impl SectionNode {
    pub fn new(title: impl Into<String>, level: usize, raw_level: usize) -> Self {
        Self {
            title: title.into(),
            level,
            raw_level,
            is_new: false,
            is_renamed: false,
            previous_title: None,
        }
    }
}

/// Document-ordered headings. A node's parent is the nearest preceding node
/// with a strictly smaller `level`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outline {
    pub sections: Vec<SectionNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedOutline(pub String);

impl std::fmt::Display for MalformedOutline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Outline {
    #[cfg(test)]
    pub fn new(sections: Vec<SectionNode>) -> Self {
        Self { sections }
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SectionNode> {
        self.sections.iter()
    }

    pub fn titles(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.title.as_str()).collect()
    }

    /// Ancestor chain for every node, root first, ending with the node itself.
    pub fn section_paths(&self) -> Vec<Vec<&str>> {
        let mut stack: Vec<(usize, &str)> = Vec::new();
        let mut out = Vec::with_capacity(self.sections.len());
        for section in &self.sections {
            while stack
                .last()
                .is_some_and(|(level, _)| *level >= section.level)
            {
                stack.pop();
            }
            stack.push((section.level, section.title.as_str()));
            out.push(stack.iter().map(|(_, title)| *title).collect());
        }
        out
    }

    /// Decodes loosely shaped section records, e.g. an outline exported as JSON
    /// by another tool. Records without a usable title are rejected.
    pub fn from_value(value: &Value) -> Result<Self, MalformedOutline> {
        let items = value
            .as_array()
            .or_else(|| value.get("sections").and_then(Value::as_array))
            .ok_or_else(|| MalformedOutline("sections is not a list".to_string()))?;

        let mut sections = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            let title = item
                .get("title")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| MalformedOutline(format!("section {idx} has no title")))?;
            let level = item
                .get("level")
                .and_then(Value::as_u64)
                .filter(|l| *l >= 1)
                .unwrap_or(1) as usize;
            let raw_level = item
                .get("rawLevel")
                .or_else(|| item.get("raw_level"))
                .and_then(Value::as_u64)
                .map(|l| l as usize)
                .unwrap_or(level);

            let mut node = SectionNode::new(title, level, raw_level);
            node.is_new = item.get("isNew").and_then(Value::as_bool).unwrap_or(false);
            node.is_renamed = item
                .get("isRenamed")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            node.previous_title = item
                .get("previousTitle")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned);
            sections.push(node);
        }
        Ok(Self { sections })
    }
}

impl<'a> IntoIterator for &'a Outline {
    type Item = &'a SectionNode;
    type IntoIter = std::slice::Iter<'a, SectionNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.sections.iter()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OutlineParser {
    marker: char,
}

impl Default for OutlineParser {
    fn default() -> Self {
        Self {
            marker: DEFAULT_HEADING_MARKER,
        }
    }
}

impl OutlineParser {
    pub fn new(marker: char) -> Self {
        Self { marker }
    }

    /// Parses every heading line of `text` into a normalised outline.
    ///
    /// Levels come from a stack of raw marker depths on the current path:
    /// a deeper raw depth pushes, anything else pops back to the first
    /// shallower entry first. The first heading is always level 1 and a
    /// heading is never more than one level deeper than its predecessor.
    pub fn parse(&self, text: &str) -> Outline {
        let mut depth_stack: Vec<usize> = Vec::new();
        let mut sections = Vec::new();

        for line in text.lines() {
            let Some((title, raw_level)) = self.parse_heading_line(line) else {
                continue;
            };

            if depth_stack.last().is_none_or(|top| raw_level > *top) {
                depth_stack.push(raw_level);
            } else {
                while depth_stack.last().is_some_and(|top| *top >= raw_level) {
                    depth_stack.pop();
                }
                depth_stack.push(raw_level);
            }

            sections.push(SectionNode::new(title, depth_stack.len(), raw_level));
        }

        Outline { sections }
    }

    /// Returns the title and raw depth of a heading line, or `None` when the
    /// line is not a well-formed heading.
    fn parse_heading_line(&self, line: &str) -> Option<(String, usize)> {
        let trimmed = line.trim();
        let lead = trimmed.chars().take_while(|c| *c == self.marker).count();
        if lead < 2 || lead == trimmed.chars().count() {
            return None;
        }

        let trail = trimmed
            .chars()
            .rev()
            .take_while(|c| *c == self.marker)
            .count();
        if trail != lead {
            return None;
        }

        let marker_len = self.marker.len_utf8();
        let inner = &trimmed[lead * marker_len..trimmed.len() - trail * marker_len];
        let title = inner.trim();
        if title.is_empty() {
            return None;
        }

        Some((title.to_string(), (lead + trail) / 2))
    }
}

#[cfg(test)]
pub fn parse_outline(text: &str) -> Outline {
    OutlineParser::default().parse(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn levels(outline: &Outline) -> Vec<usize> {
        outline.iter().map(|s| s.level).collect()
    }

    #[test]
    fn nested_headings_get_stack_levels() {
        let outline = parse_outline("==Intro==\n===Background===\n==Methods==");
        assert_eq!(outline.titles(), vec!["Intro", "Background", "Methods"]);
        assert_eq!(levels(&outline), vec![1, 2, 1]);
        assert_eq!(
            outline.iter().map(|s| s.raw_level).collect::<Vec<_>>(),
            vec![2, 3, 2]
        );
    }

    #[test]
    fn shallower_heading_after_deep_start_resets_to_top() {
        let outline = parse_outline("====Deep====\n==Top==");
        assert_eq!(outline.titles(), vec!["Deep", "Top"]);
        assert_eq!(levels(&outline), vec![1, 1]);
    }

    #[test]
    fn skipped_raw_depths_collapse_to_one_step() {
        let outline = parse_outline("==A==\n=====B=====\n===C===\n==D==");
        assert_eq!(levels(&outline), vec![1, 2, 2, 1]);
    }

    #[test]
    fn level_never_jumps_more_than_one() {
        let depths = [2usize, 6, 3, 5, 5, 2, 4, 6, 3, 2, 6, 6, 4];
        for start in 0..depths.len() {
            let text = depths[start..]
                .iter()
                .enumerate()
                .map(|(i, d)| {
                    let m = "=".repeat(*d);
                    format!("{m}H{i}{m}")
                })
                .collect::<Vec<_>>()
                .join("\n");
            let outline = parse_outline(&text);
            let got = levels(&outline);
            assert_eq!(got.first(), Some(&1));
            for pair in got.windows(2) {
                assert!(pair[1] >= 1);
                assert!(pair[1] <= pair[0] + 1, "jump in {got:?}");
            }
        }
    }

    #[test]
    fn malformed_and_empty_lines_are_ignored() {
        let text = "plain text\n==Unbalanced===\n=Single=\n====\n==  ==\n == Spaced == \n";
        let outline = parse_outline(text);
        assert_eq!(outline.titles(), vec!["Spaced"]);
        assert!(parse_outline("").is_empty());
    }

    #[test]
    fn parsing_is_pure() {
        let text = "==History==\n===Early===\n==Uses==";
        assert_eq!(parse_outline(text), parse_outline(text));
    }

    #[test]
    fn custom_marker_is_respected() {
        let outline = OutlineParser::new('#').parse("##One##\n###Two###\n==Three==");
        assert_eq!(outline.titles(), vec!["One", "Two"]);
    }

    #[test]
    fn section_paths_follow_parent_rule() {
        let outline = parse_outline("==A==\n===B===\n====C====\n===D===\n==E==");
        let paths = outline.section_paths();
        assert_eq!(paths[2], vec!["A", "B", "C"]);
        assert_eq!(paths[3], vec!["A", "D"]);
        assert_eq!(paths[4], vec!["E"]);
    }

    #[test]
    fn from_value_reads_loose_records() {
        let value = json!([
            {"title": "Intro", "level": 1},
            {"title": " Background ", "level": 2, "isNew": true}
        ]);
        let outline = Outline::from_value(&value).expect("decode");
        assert_eq!(outline.titles(), vec!["Intro", "Background"]);
        assert!(outline.sections[1].is_new);
        assert_eq!(outline.sections[1].raw_level, 2);
    }

    #[test]
    fn from_value_rejects_missing_titles_and_non_lists() {
        assert!(Outline::from_value(&json!({"sections": "nope"})).is_err());
        assert!(Outline::from_value(&json!([{"level": 1}])).is_err());
    }
}
