//! Paragraph construction and replacement

use super::ApplyError;
use crate::alias::{ParagraphTemplate, StyleAliasTable};
use crate::extract::{has_drawing, paragraph_runs, run_text};
use crate::markup::{parse_element, Element, Node};
use crate::plan::{ParagraphEdit, RunFragment};
use std::collections::BTreeMap;

/// `w:t` holding `text`, marked space-preserving when it needs to be
fn text_element(text: &str) -> Element {
    let t = Element::new("w:t");
    let t = if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        t.with_attr("xml:space", "preserve")
    } else {
        t
    };
    t.with_text(text)
}

/// A run with the given properties; tabs become `w:tab`
pub(crate) fn text_run(r_pr: Option<&Element>, text: &str) -> Element {
    let mut run = Element::new("w:r");
    if let Some(r_pr) = r_pr {
        run.children.push(Node::Element(r_pr.clone()));
    }
    for (i, piece) in text.split('\t').enumerate() {
        if i > 0 {
            run.children.push(Node::Element(Element::new("w:tab")));
        }
        if !piece.is_empty() {
            run.children.push(Node::Element(text_element(piece)));
        }
    }
    run
}

/// Run properties of the first text-bearing run
pub(crate) fn first_text_r_pr(p: &Element) -> Option<Element> {
    paragraph_runs(p)
        .into_iter()
        .find(|r| !run_text(r).is_empty())
        .and_then(|r| r.child("w:rPr"))
        .cloned()
}

/// A paragraph with one run of text
pub(crate) fn plain(p_pr: Option<&Element>, r_pr: Option<&Element>, text: &str) -> Element {
    let mut p = Element::new("w:p");
    if let Some(p_pr) = p_pr {
        p.children.push(Node::Element(p_pr.clone()));
    }
    if !text.is_empty() {
        p.children.push(Node::Element(text_run(r_pr, text)));
    }
    p
}

/// Put `text` into the first `w:t` of the paragraph and empty the others
///
/// Everything else (drawings, fields, bookmarks) stays where it is.
pub(crate) fn set_text_in_place(p: &mut Element, text: &str) {
    fn visit(el: &mut Element, text: &str, placed: &mut bool) {
        for child in el.elements_mut() {
            if child.is("w:r") {
                let mut seen = false;
                child.children.retain(|n| match n {
                    Node::Element(t) if t.is("w:t") => {
                        let keep = !*placed && !seen;
                        seen = true;
                        keep
                    }
                    _ => true,
                });
                if let Some(t) = child.child_mut("w:t") {
                    t.set_attr("xml:space", "preserve");
                    t.set_text(text);
                    *placed = true;
                }
            } else if !child.is("w:pPr") {
                visit(child, text, placed);
            }
        }
    }
    let mut placed = false;
    visit(p, text, &mut placed);
    if !placed && !text.is_empty() {
        p.children.push(Node::Element(text_run(None, text)));
    }
}

fn template<'a>(
    aliases: &'a StyleAliasTable,
    alias: &str,
    target: &str,
) -> Result<&'a ParagraphTemplate, ApplyError> {
    aliases
        .paragraph(alias)
        .ok_or_else(|| ApplyError::UnknownAlias {
            target: target.to_string(),
            alias: alias.to_string(),
        })
}

/// Runs for `text`, from fragments when given
fn build_runs(
    text: &str,
    fragments: Option<&[RunFragment]>,
    run_templates: Option<&BTreeMap<String, String>>,
    template: &ParagraphTemplate,
    fallback: Option<&Element>,
    target: &str,
) -> Result<Vec<Element>, ApplyError> {
    let Some(fragments) = fragments else {
        return Ok(if text.is_empty() {
            Vec::new()
        } else {
            vec![text_run(fallback, text)]
        });
    };

    let mut runs = Vec::with_capacity(fragments.len());
    for fragment in fragments.iter().filter(|f| !f.text.is_empty()) {
        let r_pr = match run_templates.and_then(|pool| pool.get(&fragment.run_style)) {
            Some(xml) => Some(parse_element(xml)?),
            None => match template.run(&fragment.run_style) {
                Some(run) => run.r_pr.clone(),
                None => {
                    return Err(ApplyError::UnknownAlias {
                        target: target.to_string(),
                        alias: fragment.run_style.clone(),
                    })
                }
            },
        };
        runs.push(text_run(r_pr.as_ref(), &fragment.text));
    }
    Ok(runs)
}

/// Template paragraph properties, keeping a section break of the original
fn restyled_properties(template: &ParagraphTemplate, original: Option<&Element>) -> Option<Element> {
    let section = original.and_then(|p_pr| p_pr.child("w:sectPr")).cloned();
    let mut p_pr = template.p_pr.clone();
    if let Some(section) = section {
        p_pr.get_or_insert_with(|| Element::new("w:pPr"))
            .children
            .push(Node::Element(section));
    }
    p_pr
}

/// Replacement for an existing paragraph
pub(crate) fn replace(
    p: &Element,
    edit: &ParagraphEdit,
    aliases: &StyleAliasTable,
    target: &str,
) -> Result<Element, ApplyError> {
    let template = template(aliases, &edit.style_alias, target)?;
    let original_p_pr = p.child("w:pPr");
    let p_pr = if edit.restyle {
        restyled_properties(template, original_p_pr)
    } else {
        original_p_pr.cloned()
    };

    if has_drawing(p) && edit.runs.is_none() {
        let mut out = p.clone();
        if edit.restyle {
            out.remove_children_named("w:pPr");
            if let Some(p_pr) = p_pr {
                out.children.insert(0, Node::Element(p_pr));
            }
        }
        set_text_in_place(&mut out, &edit.text);
        return Ok(out);
    }

    let fallback = if edit.restyle {
        template.runs.first().and_then(|r| r.r_pr.clone())
    } else {
        first_text_r_pr(p)
    };
    let runs = build_runs(
        &edit.text,
        edit.runs.as_deref(),
        edit.run_templates.as_ref(),
        template,
        fallback.as_ref(),
        target,
    )?;

    let mut out = Element {
        name: p.name.clone(),
        attrs: p.attrs.clone(),
        children: Vec::new(),
    };
    if let Some(p_pr) = p_pr {
        out.children.push(Node::Element(p_pr));
    }
    let starts = p.descendants_named("w:bookmarkStart");
    out.children
        .extend(starts.into_iter().cloned().map(Node::Element));
    out.children.extend(runs.into_iter().map(Node::Element));
    let ends = p.descendants_named("w:bookmarkEnd");
    out.children.extend(ends.into_iter().cloned().map(Node::Element));
    Ok(out)
}

/// New paragraph built from a template
pub(crate) fn create(
    edit: &ParagraphEdit,
    aliases: &StyleAliasTable,
    target: &str,
) -> Result<Element, ApplyError> {
    let template = template(aliases, &edit.style_alias, target)?;
    let fallback = template.runs.first().and_then(|r| r.r_pr.as_ref());
    let runs = build_runs(
        &edit.text,
        edit.runs.as_deref(),
        edit.run_templates.as_ref(),
        template,
        fallback,
        target,
    )?;
    let mut p = Element::new("w:p");
    if let Some(p_pr) = &template.p_pr {
        p.children.push(Node::Element(p_pr.clone()));
    }
    p.children.extend(runs.into_iter().map(Node::Element));
    Ok(p)
}
