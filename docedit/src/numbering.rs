//! Auto-numbering definitions and the numbering resolver
//!
//! Word computes list and heading numbers at layout time from
//! `word/numbering.xml`. The resolver replays that computation over the
//! paragraphs of a snapshot in document order so each numbered block can
//! show its prefix. Anything the definitions do not pin down is reported
//! as [`Numbering::Indeterminate`] instead of guessed.

use crate::markup::Element;
use crate::model::Numbering;
use crate::styles::{NumberingRef, StyleSheet};
use std::collections::HashMap;

/// Deepest list level Word supports (levels 0-8)
pub const MAX_LEVELS: usize = 9;

/// Largest counter value Word accepts for a start value
pub const MAX_COUNTER: u32 = 32767;

/// Number format of one list level (`w:numFmt`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumberFormat {
    /// 1, 2, 3
    Decimal,
    /// 01, 02, 03
    DecimalZero,
    /// a, b, c
    LowerLetter,
    /// A, B, C
    UpperLetter,
    /// i, ii, iii
    LowerRoman,
    /// I, II, III
    UpperRoman,
    /// Glyph taken from the level text
    Bullet,
    /// Number not displayed
    None,
    /// Any format the resolver cannot render
    Unsupported(String),
}

impl NumberFormat {
    fn parse(value: &str) -> Self {
        match value {
            "decimal" => NumberFormat::Decimal,
            "decimalZero" => NumberFormat::DecimalZero,
            "lowerLetter" => NumberFormat::LowerLetter,
            "upperLetter" => NumberFormat::UpperLetter,
            "lowerRoman" => NumberFormat::LowerRoman,
            "upperRoman" => NumberFormat::UpperRoman,
            "bullet" => NumberFormat::Bullet,
            "none" => NumberFormat::None,
            other => NumberFormat::Unsupported(other.to_string()),
        }
    }

    /// Render a counter value in this format
    pub fn render(&self, value: u32) -> String {
        match self {
            NumberFormat::Decimal | NumberFormat::Unsupported(_) => value.to_string(),
            NumberFormat::DecimalZero => format!("{:02}", value),
            NumberFormat::LowerLetter => letters(value),
            NumberFormat::UpperLetter => letters(value).to_uppercase(),
            NumberFormat::LowerRoman => roman(value).to_lowercase(),
            NumberFormat::UpperRoman => roman(value),
            NumberFormat::Bullet | NumberFormat::None => String::new(),
        }
    }
}

/// Word's alphabetic numbering: a..z, aa..zz, aaa..
fn letters(value: u32) -> String {
    if value == 0 {
        return String::new();
    }
    let index = (value - 1) % 26;
    let repeat = (value - 1) / 26 + 1;
    let letter = char::from(b'a' + index as u8);
    std::iter::repeat(letter).take(repeat as usize).collect()
}

fn roman(mut value: u32) -> String {
    const TABLE: [(u32, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (n, glyph) in TABLE {
        while value >= n {
            out.push_str(glyph);
            value -= n;
        }
    }
    out
}

/// One level of an abstract numbering definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelDefinition {
    /// First counter value
    pub start: u32,
    /// Number format
    pub format: NumberFormat,
    /// Level text template such as `%1-%2.`
    pub text: String,
}

#[derive(Debug, Clone, Default)]
struct NumInstance {
    abstract_id: u32,
    start_overrides: HashMap<u8, u32>,
}

/// Parsed `word/numbering.xml`
#[derive(Debug, Clone, Default)]
pub struct NumberingDefinitions {
    present: bool,
    abstracts: HashMap<u32, HashMap<u8, LevelDefinition>>,
    instances: HashMap<u32, NumInstance>,
}

fn parse_val<T: std::str::FromStr>(el: Option<&Element>) -> Option<T> {
    el.and_then(Element::val).and_then(|v| v.trim().parse().ok())
}

/// Start value clamped to [`MAX_COUNTER`]
fn parse_start(el: Option<&Element>) -> Option<u32> {
    parse_val::<u32>(el).map(|v| v.min(MAX_COUNTER))
}

impl NumberingDefinitions {
    /// Definitions for a package without a numbering part
    pub fn missing() -> Self {
        Self::default()
    }

    /// Build from the root of `word/numbering.xml`
    pub fn from_root(root: &Element) -> Self {
        let mut defs = Self {
            present: true,
            ..Self::default()
        };

        for abs in root.children_named("w:abstractNum") {
            let Some(id) = abs.attr("w:abstractNumId").and_then(|v| v.parse().ok()) else {
                continue;
            };
            let levels = abs
                .children_named("w:lvl")
                .filter_map(|lvl| {
                    let ilvl = lvl.attr("w:ilvl")?.parse::<u8>().ok()?;
                    Some((
                        ilvl,
                        LevelDefinition {
                            start: parse_start(lvl.child("w:start")).unwrap_or(1),
                            format: NumberFormat::parse(
                                lvl.child("w:numFmt")
                                    .and_then(Element::val)
                                    .unwrap_or("decimal"),
                            ),
                            text: lvl
                                .child("w:lvlText")
                                .and_then(Element::val)
                                .unwrap_or_default()
                                .to_string(),
                        },
                    ))
                })
                .collect();
            defs.abstracts.insert(id, levels);
        }

        for num in root.children_named("w:num") {
            let Some(num_id) = num.attr("w:numId").and_then(|v| v.parse().ok()) else {
                continue;
            };
            let Some(abstract_id) = parse_val(num.child("w:abstractNumId")) else {
                continue;
            };
            let start_overrides = num
                .children_named("w:lvlOverride")
                .filter_map(|o| {
                    let ilvl = o.attr("w:ilvl")?.parse::<u8>().ok()?;
                    let start = parse_start(o.child("w:startOverride"))?;
                    Some((ilvl, start))
                })
                .collect();
            defs.instances.insert(
                num_id,
                NumInstance {
                    abstract_id,
                    start_overrides,
                },
            );
        }

        log::debug!(
            "Loaded {} numbering instances over {} abstract definitions",
            defs.instances.len(),
            defs.abstracts.len()
        );
        defs
    }

    /// Whether the package had a numbering part
    pub fn is_present(&self) -> bool {
        self.present
    }

    /// Effective definition of one level of one instance
    pub fn level(&self, num_id: u32, level: u8) -> Option<LevelDefinition> {
        let instance = self.instances.get(&num_id)?;
        let mut def = self
            .abstracts
            .get(&instance.abstract_id)?
            .get(&level)?
            .clone();
        if let Some(start) = instance.start_overrides.get(&level) {
            def.start = *start;
        }
        Some(def)
    }

    fn has_instance(&self, num_id: u32) -> bool {
        self.instances.contains_key(&num_id)
    }
}

/// Numbering applying to one paragraph before counting
#[derive(Debug, Clone, PartialEq, Eq)]
enum Applied {
    Unnumbered,
    Instance { num_id: u32, level: u8 },
    Unknown(String),
}

/// Replays list counters over paragraphs in document order
///
/// Counters are kept per numbering instance; reaching level L advances
/// counter L and clears every deeper counter, so a new level-1 section
/// restarts its level-2 numbering.
pub struct NumberingResolver<'a> {
    definitions: &'a NumberingDefinitions,
    styles: &'a StyleSheet,
    counters: HashMap<u32, [Option<u32>; MAX_LEVELS]>,
}

impl<'a> NumberingResolver<'a> {
    /// Create a resolver with all counters empty
    pub fn new(definitions: &'a NumberingDefinitions, styles: &'a StyleSheet) -> Self {
        Self {
            definitions,
            styles,
            counters: HashMap::new(),
        }
    }

    fn applied(&self, paragraph: &Element) -> Applied {
        let p_pr = paragraph.child("w:pPr");
        let style_id = p_pr
            .and_then(|p| p.child("w:pStyle"))
            .and_then(Element::val)
            .unwrap_or_else(|| self.styles.default_paragraph_style());
        let from_style = self.styles.numbering(style_id);
        let num_pr = p_pr.and_then(|p| p.child("w:numPr"));
        let direct = num_pr.and_then(NumberingRef::from_num_pr);

        // A bare <w:ilvl> picks a level of the style's list
        let direct_level = num_pr
            .and_then(|n| n.child("w:ilvl"))
            .and_then(Element::val)
            .and_then(|v| v.trim().parse::<u8>().ok());

        let effective = match (direct, from_style) {
            (Some(d), Some(s)) if d.num_id != 0 && s.num_id != 0 && d.num_id != s.num_id => {
                return Applied::Unknown(format!(
                    "paragraph numbering (numId {}) conflicts with style '{}' numbering (numId {})",
                    d.num_id, style_id, s.num_id
                ));
            }
            (Some(d), _) => d,
            (None, Some(s)) => NumberingRef {
                num_id: s.num_id,
                level: direct_level.or(s.level),
            },
            (None, None) => return Applied::Unnumbered,
        };

        if effective.num_id == 0 {
            return Applied::Unnumbered;
        }
        let level = effective.level.unwrap_or(0);
        if usize::from(level) >= MAX_LEVELS {
            return Applied::Unknown(format!("list level {} out of range", level));
        }
        Applied::Instance {
            num_id: effective.num_id,
            level,
        }
    }

    /// Advance counters for `paragraph` and return its numbering state
    ///
    /// Returns `None` for paragraphs without numbering.
    pub fn resolve(&mut self, paragraph: &Element) -> Option<Numbering> {
        let (num_id, level) = match self.applied(paragraph) {
            Applied::Unnumbered => return None,
            Applied::Unknown(reason) => return Some(Numbering::Indeterminate { reason }),
            Applied::Instance { num_id, level } => (num_id, level),
        };

        if !self.definitions.is_present() {
            return Some(Numbering::Indeterminate {
                reason: "document has no numbering definitions".to_string(),
            });
        }
        if !self.definitions.has_instance(num_id) {
            return Some(Numbering::Indeterminate {
                reason: format!("numbering instance {} is not defined", num_id),
            });
        }
        let Some(def) = self.definitions.level(num_id, level) else {
            return Some(Numbering::Indeterminate {
                reason: format!("level {} of numbering instance {} is not defined", level, num_id),
            });
        };

        let counters = self.counters.entry(num_id).or_insert([None; MAX_LEVELS]);
        let idx = usize::from(level);
        let value = match counters[idx] {
            None => def.start,
            Some(previous) => match previous.checked_add(1).filter(|v| *v <= MAX_COUNTER) {
                Some(next) => next,
                None => {
                    return Some(Numbering::Indeterminate {
                        reason: format!(
                            "level {} of numbering instance {} counts past {}",
                            level, num_id, MAX_COUNTER
                        ),
                    })
                }
            },
        };
        counters[idx] = Some(value);
        for deeper in counters.iter_mut().skip(idx + 1) {
            *deeper = None;
        }
        let snapshot = *counters;

        if let NumberFormat::Unsupported(fmt) = &def.format {
            return Some(Numbering::Indeterminate {
                reason: format!("number format '{}' is not supported", fmt),
            });
        }

        let prefix = self.render_prefix(num_id, &def, &snapshot);
        Some(Numbering::Computed {
            num_id,
            level,
            value,
            start: def.start,
            prefix,
        })
    }

    fn render_prefix(
        &self,
        num_id: u32,
        def: &LevelDefinition,
        counters: &[Option<u32>; MAX_LEVELS],
    ) -> String {
        if def.format == NumberFormat::Bullet {
            return def.text.clone();
        }
        let mut prefix = String::with_capacity(def.text.len());
        let mut chars = def.text.chars().peekable();
        while let Some(c) = chars.next() {
            let placeholder = match (c, chars.peek().and_then(|d| d.to_digit(10))) {
                ('%', Some(k @ 1..=9)) => k as usize,
                _ => {
                    prefix.push(c);
                    continue;
                }
            };
            chars.next();
            let level = (placeholder - 1) as u8;
            let level_def = self.definitions.level(num_id, level);
            let start = level_def.as_ref().map_or(1, |d| d.start);
            let value = counters[placeholder - 1].unwrap_or(start);
            let rendered = match level_def {
                Some(d) => d.format.render(value),
                None => value.to_string(),
            };
            prefix.push_str(&rendered);
        }
        prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{parse, parse_element};

    const NUMBERING: &str = r#"<w:numbering xmlns:w="urn:w">
        <w:abstractNum w:abstractNumId="0">
            <w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="decimal"/><w:lvlText w:val="%1."/></w:lvl>
            <w:lvl w:ilvl="1"><w:start w:val="1"/><w:numFmt w:val="decimal"/><w:lvlText w:val="%1-%2."/></w:lvl>
            <w:lvl w:ilvl="2"><w:start w:val="1"/><w:numFmt w:val="lowerLetter"/><w:lvlText w:val="(%3)"/></w:lvl>
        </w:abstractNum>
        <w:abstractNum w:abstractNumId="1">
            <w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="bullet"/><w:lvlText w:val="•"/></w:lvl>
            <w:lvl w:ilvl="1"><w:start w:val="1"/><w:numFmt w:val="chineseCounting"/><w:lvlText w:val="%2"/></w:lvl>
        </w:abstractNum>
        <w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>
        <w:num w:numId="2"><w:abstractNumId w:val="1"/></w:num>
        <w:num w:numId="3"><w:abstractNumId w:val="0"/><w:lvlOverride w:ilvl="0"><w:startOverride w:val="5"/></w:lvlOverride></w:num>
    </w:numbering>"#;

    const STYLES: &str = r#"<w:styles xmlns:w="urn:w">
        <w:style w:type="paragraph" w:styleId="Heading1"><w:pPr><w:numPr><w:numId w:val="1"/></w:numPr><w:outlineLvl w:val="0"/></w:pPr></w:style>
        <w:style w:type="paragraph" w:styleId="Heading2"><w:pPr><w:numPr><w:ilvl w:val="1"/><w:numId w:val="1"/></w:numPr><w:outlineLvl w:val="1"/></w:pPr></w:style>
    </w:styles>"#;

    fn defs() -> NumberingDefinitions {
        NumberingDefinitions::from_root(parse(NUMBERING).unwrap().root())
    }

    fn styles() -> StyleSheet {
        StyleSheet::from_root(parse(STYLES).unwrap().root())
    }

    fn styled(style: &str) -> Element {
        parse_element(&format!(
            r#"<w:p><w:pPr><w:pStyle w:val="{}"/></w:pPr></w:p>"#,
            style
        ))
        .unwrap()
    }

    fn direct(num_id: u32, ilvl: u8) -> Element {
        parse_element(&format!(
            r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="{}"/><w:numId w:val="{}"/></w:numPr></w:pPr></w:p>"#,
            ilvl, num_id
        ))
        .unwrap()
    }

    fn prefixes(resolver: &mut NumberingResolver<'_>, paragraphs: &[Element]) -> Vec<String> {
        paragraphs
            .iter()
            .map(|p| match resolver.resolve(p) {
                Some(Numbering::Computed { prefix, .. }) => prefix,
                Some(Numbering::Indeterminate { .. }) => "?".to_string(),
                None => "-".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_outline_numbering_resets_deeper_levels() {
        // Arrange
        let defs = defs();
        let styles = styles();
        let mut resolver = NumberingResolver::new(&defs, &styles);
        let doc = [
            styled("Heading1"),
            styled("Heading2"),
            styled("Heading2"),
            styled("Heading1"),
            styled("Heading2"),
            parse_element("<w:p/>").unwrap(),
        ];

        // Act
        let got = prefixes(&mut resolver, &doc);

        // Assert
        assert_eq!(got, vec!["1.", "1-1.", "1-2.", "2.", "2-1.", "-"]);
    }

    #[test]
    fn test_formats_and_start_override() {
        let defs = defs();
        let styles = StyleSheet::default();
        let mut resolver = NumberingResolver::new(&defs, &styles);
        let doc = [direct(3, 0), direct(3, 2), direct(3, 2), direct(2, 0)];
        assert_eq!(prefixes(&mut resolver, &doc), vec!["5.", "(a)", "(b)", "•"]);
    }

    #[test]
    fn test_indeterminate_cases() {
        let defs = defs();
        let styles = styles();
        let mut resolver = NumberingResolver::new(&defs, &styles);

        // unknown instance, undefined level, unsupported format
        let doc = [direct(9, 0), direct(1, 7), direct(2, 1)];
        assert_eq!(prefixes(&mut resolver, &doc), vec!["?", "?", "?"]);

        // direct numPr naming another instance than the style's
        let conflict = parse_element(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/><w:numPr><w:ilvl w:val="0"/><w:numId w:val="2"/></w:numPr></w:pPr></w:p>"#,
        )
        .unwrap();
        assert!(matches!(
            resolver.resolve(&conflict),
            Some(Numbering::Indeterminate { .. })
        ));

        let missing = NumberingDefinitions::missing();
        let mut resolver = NumberingResolver::new(&missing, &styles);
        assert!(matches!(
            resolver.resolve(&styled("Heading1")),
            Some(Numbering::Indeterminate { .. })
        ));
    }

    #[test]
    fn test_num_id_zero_disables_style_numbering() {
        let defs = defs();
        let styles = styles();
        let mut resolver = NumberingResolver::new(&defs, &styles);
        let p = parse_element(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/><w:numPr><w:numId w:val="0"/></w:numPr></w:pPr></w:p>"#,
        )
        .unwrap();
        assert_eq!(resolver.resolve(&p), None);
    }

    #[test]
    fn test_huge_start_is_clamped_and_overflow_is_indeterminate() {
        // Arrange
        let numbering = parse(
            r#"<w:numbering xmlns:w="urn:w">
            <w:abstractNum w:abstractNumId="0"><w:lvl w:ilvl="0"><w:start w:val="4294967295"/><w:numFmt w:val="lowerLetter"/><w:lvlText w:val="%1)"/></w:lvl></w:abstractNum>
            <w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>
        </w:numbering>"#,
        )
        .unwrap();
        let defs = NumberingDefinitions::from_root(numbering.root());
        let styles = styles();
        let mut resolver = NumberingResolver::new(&defs, &styles);
        let item = direct(1, 0);

        // Act
        let first = resolver.resolve(&item);
        let second = resolver.resolve(&item);

        // Assert
        assert_eq!(defs.level(1, 0).unwrap().start, MAX_COUNTER);
        assert!(matches!(first, Some(Numbering::Computed { value, .. }) if value == MAX_COUNTER));
        assert!(matches!(second, Some(Numbering::Indeterminate { .. })));
    }

    #[test]
    fn test_letters_and_roman() {
        assert_eq!(letters(1), "a");
        assert_eq!(letters(26), "z");
        assert_eq!(letters(28), "bb");
        assert_eq!(roman(1994), "MCMXCIV");
        assert_eq!(NumberFormat::LowerRoman.render(4), "iv");
        assert_eq!(NumberFormat::DecimalZero.render(7), "07");
    }
}
