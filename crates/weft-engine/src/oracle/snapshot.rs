//! The page outline sent to the oracle alongside the screenshot.

/// Evaluated in the browser to produce a depth-bounded JSON outline of
/// the DOM. Only identity attributes and truncated direct text survive,
/// so the payload stays small even on deep pages.
pub const DOM_SNAPSHOT_JS: &str = r#"
(() => {
  const MAX_DEPTH = 10;
  const MAX_TEXT = 60;
  const MAX_CHILDREN = 20;
  const KEEP_ATTRS = ['id', 'class', 'name', 'type', 'role', 'aria-label', 'placeholder', 'data-testid', 'href'];
  const SKIP_TAGS = new Set(['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE', 'META', 'LINK', 'svg']);

  const ownText = (el) => {
    let text = '';
    for (const node of el.childNodes) {
      if (node.nodeType === Node.TEXT_NODE) text += node.textContent;
    }
    text = text.replace(/\s+/g, ' ').trim();
    return text.length > MAX_TEXT ? text.slice(0, MAX_TEXT) + '...' : text;
  };

  const walk = (el, depth) => {
    if (depth > MAX_DEPTH || SKIP_TAGS.has(el.tagName)) return null;
    const entry = { tag: el.tagName.toLowerCase() };
    for (const attr of KEEP_ATTRS) {
      const value = el.getAttribute(attr);
      if (value) entry[attr] = value;
    }
    const text = ownText(el);
    if (text) entry.text = text;
    const children = [];
    for (const child of el.children) {
      if (children.length >= MAX_CHILDREN) break;
      const walked = walk(child, depth + 1);
      if (walked) children.push(walked);
    }
    if (children.length) entry.children = children;
    return entry;
  };

  return JSON.stringify(walk(document.body, 0));
})()
"#;
