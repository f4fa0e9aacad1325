//! Page inspection helpers evaluated inside the tab.

use anyhow::Result;
use headless_chrome::Tab;

use super::step::truncate_chars;

/// Produces a compact, one-line-per-element view of the visible page.
///
/// Interactive elements (links, buttons, inputs, selects) get a stable
/// `data-eid="[eN]"` attribute so the LLM can target them with
/// `[data-eid="[eN]"]`. Leaf text nodes are listed quoted. Nothing is removed
/// from the page.
const SNAPSHOT_JS: &str = r#"
(() => {
  const skipped = new Set(['SCRIPT', 'STYLE', 'NOSCRIPT', 'SVG', 'LINK', 'TEMPLATE']);
  const interactive = new Set(['a', 'button', 'input', 'textarea', 'select']);
  const out = [];
  const seen = new Set();
  let next = 0;

  const visible = (el) => {
    if (el.offsetParent === null && !['BODY', 'HTML'].includes(el.tagName)) return false;
    const style = getComputedStyle(el);
    return style.display !== 'none' && style.visibility !== 'hidden' && style.opacity !== '0';
  };
  const clip = (s, n) => (s || '').trim().slice(0, n);
  const emit = (line) => { if (line && !seen.has(line)) { seen.add(line); out.push(line); } };

  const describe = (el, tag, eid) => {
    switch (tag) {
      case 'a': return `${eid} link "${clip(el.textContent, 60)}"`;
      case 'button': return `${eid} button "${clip(el.textContent, 60)}"`;
      case 'select':
        return `${eid} select [${[...el.options].map(o => clip(o.text, 20)).join('|')}]`;
      default: {
        let d = `${eid} ${tag} type=${el.type || 'text'} placeholder="${el.placeholder || ''}"`;
        if (el.name) d += ` name=${el.name}`;
        if (el.value) d += ` value="${el.value.slice(0, 30)}"`;
        return d;
      }
    }
  };

  const walk = (node, depth) => {
    if (depth > 15) return;
    for (const el of node.children) {
      if (skipped.has(el.tagName) || !visible(el)) continue;
      const tag = el.tagName.toLowerCase();
      if (interactive.has(tag)) {
        const eid = `[e${next++}]`;
        el.setAttribute('data-eid', eid);
        emit(describe(el, tag, eid));
      } else if (el.children.length === 0) {
        const text = clip(el.textContent, 200);
        if (text.length > 2 && text.length < 200) emit(`  "${text.slice(0, 100)}"`);
      }
      walk(el, depth + 1);
    }
  };

  walk(document.body, 0);
  return out.join('\n');
})()
"#;

fn evaluate_string(tab: &Tab, expression: &str) -> Result<Option<String>> {
    let result = tab.evaluate(expression, false)?;
    Ok(result.value.and_then(|v| v.as_str().map(String::from)))
}

/// Captures the page snapshot, cut to `max_chars`.
pub fn capture_dom_snapshot(tab: &Tab, max_chars: usize) -> Result<String> {
    let raw = evaluate_string(tab, SNAPSHOT_JS)?.unwrap_or_default();
    Ok(clip_snapshot(raw, max_chars))
}

pub fn current_url(tab: &Tab) -> Result<String> {
    Ok(evaluate_string(tab, "window.location.href")?.unwrap_or_else(|| "unknown".to_string()))
}

pub fn page_title(tab: &Tab) -> Result<String> {
    Ok(evaluate_string(tab, "document.title")?.unwrap_or_else(|| "untitled".to_string()))
}

/// Inner text of the first element matching `selector`, or empty.
pub fn inner_text(tab: &Tab, selector: &str) -> Result<String> {
    let js_sel = super::step::js_selector(selector);
    Ok(evaluate_string(
        tab,
        &format!("(document.querySelector('{js_sel}') || {{}}).innerText || ''"),
    )?
    .unwrap_or_default())
}

fn clip_snapshot(raw: String, max_chars: usize) -> String {
    let total = raw.chars().count();
    if total <= max_chars {
        return raw;
    }
    format!(
        "{}\n... [truncated, {} total chars]",
        truncate_chars(&raw, max_chars),
        total
    )
}
