//! JavaScript fragments shared by the generated scripts.
//!
//! Fragments read their parameters from the `ARGS` object declared by the
//! script wrapper and never interpolate anything themselves.

/// Helpers available to every script body.
pub(super) const PRELUDE: &str = r#"
  const sleep = (ms) => new Promise((resolve) => setTimeout(resolve, ms));
  const isDisabled = (el) =>
    !!(el.disabled ||
      el.getAttribute('aria-disabled') === 'true' ||
      el.classList.contains('disabled') ||
      el.hasAttribute('disabled'));
  const waitFor = async (selector, timeoutMs, intervalMs, accept) => {
    const started = Date.now();
    while (Date.now() - started <= timeoutMs) {
      const el = document.querySelector(selector);
      if (el && accept(el)) return { el, waited: Date.now() - started };
      await sleep(intervalMs);
    }
    return null;
  };
  const writeText = (el, text) => {
    el.focus();
    if (el instanceof HTMLTextAreaElement || el instanceof HTMLInputElement) {
      const proto = el instanceof HTMLTextAreaElement
        ? HTMLTextAreaElement.prototype
        : HTMLInputElement.prototype;
      const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
      setter.call(el, text);
      el.dispatchEvent(new Event('input', { bubbles: true }));
      el.dispatchEvent(new Event('change', { bubbles: true }));
    } else {
      el.textContent = text;
      el.dispatchEvent(new InputEvent('input', { bubbles: true, inputType: 'insertText', data: text }));
    }
  };
  const pressEnter = (el) => {
    const init = { key: 'Enter', code: 'Enter', keyCode: 13, which: 13, bubbles: true, cancelable: true };
    el.dispatchEvent(new KeyboardEvent('keydown', init));
    el.dispatchEvent(new KeyboardEvent('keypress', init));
    el.dispatchEvent(new KeyboardEvent('keyup', init));
  };
  const failure = (e) => ({ success: false, reason: 'script_failed', message: String((e && e.message) || e) });
"#;

/// Wait for `ARGS.selector`, then focus it or write `ARGS.text` into it.
pub(super) const WAIT_FOR_ELEMENT: &str = r#"
  try {
    const found = await waitFor(ARGS.selector, ARGS.waitMs, ARGS.intervalMs, () => true);
    if (!found) return { success: false, reason: 'input_not_found' };
    if (ARGS.text === null) {
      found.el.focus();
    } else {
      writeText(found.el, ARGS.text);
    }
    return { success: true, waitedMs: found.waited };
  } catch (e) {
    return failure(e);
  }
"#;

/// Wait for an enabled `ARGS.selector` and click it.
pub(super) const CLICK_ENABLED_BUTTON: &str = r#"
  try {
    const found = await waitFor(ARGS.selector, ARGS.waitMs, ARGS.intervalMs, (el) => !isDisabled(el));
    if (!found) return { success: false, reason: 'timeout' };
    found.el.click();
    return { success: true, waitedMs: found.waited };
  } catch (e) {
    return failure(e);
  }
"#;

/// Wait for `ARGS.selector` and press Enter on it.
pub(super) const PRESS_ENTER: &str = r#"
  try {
    const found = await waitFor(ARGS.selector, ARGS.waitMs, ARGS.intervalMs, () => true);
    if (!found) return { success: false, reason: 'input_not_found' };
    found.el.focus();
    pressEnter(found.el);
    return { success: true, waitedMs: found.waited };
  } catch (e) {
    return failure(e);
  }
"#;

/// Focus `ARGS.selector` and paste: a synthetic paste event carrying
/// `ARGS.image` when given, otherwise `execCommand('paste')`.
pub(super) const PASTE_TRIGGER: &str = r#"
  try {
    const found = await waitFor(ARGS.selector, ARGS.waitMs, ARGS.intervalMs, () => true);
    if (!found) return { success: false, reason: 'input_not_found' };
    const el = found.el;
    el.focus();
    if (document.execCommand('paste')) return { success: true, method: 'execCommand' };
    if (navigator.clipboard && navigator.clipboard.read) {
      let items = [];
      try {
        items = await navigator.clipboard.read();
      } catch (e) {
        return { success: false, reason: 'paste_unsupported', message: String(e) };
      }
      const transfer = new DataTransfer();
      for (const item of items) {
        const type = item.types.find((t) => t.startsWith('image/'));
        if (!type) continue;
        const blob = await item.getType(type);
        transfer.items.add(new File([blob], 'pasted-image.' + type.split('/')[1], { type }));
      }
      if (transfer.items.length === 0) return { success: false, reason: 'paste_unsupported', message: 'clipboard holds no image' };
      el.dispatchEvent(new ClipboardEvent('paste', { clipboardData: transfer, bubbles: true, cancelable: true }));
      return { success: true, method: 'clipboardRead' };
    }
    return { success: false, reason: 'paste_unsupported' };
  } catch (e) {
    return failure(e);
  }
"#;

/// Insert `ARGS.text`, then optionally submit by click or Enter.
pub(super) const SEND_TEXT: &str = r#"
  try {
    if (ARGS.readySelector !== null) {
      const ready = await waitFor(ARGS.readySelector, ARGS.waitMs, ARGS.intervalMs, () => true);
      if (!ready) return { success: false, reason: 'input_not_found' };
    }
    const input = await waitFor(ARGS.selector, ARGS.waitMs, ARGS.intervalMs, () => true);
    if (!input) return { success: false, reason: 'input_not_found' };
    writeText(input.el, ARGS.text);
    if (!ARGS.autoSubmit) return { success: true, submitted: false };
    if (ARGS.mode === 'enterKey') {
      await sleep(ARGS.submitIntervalMs);
      input.el.focus();
      pressEnter(input.el);
      return { success: true, submitted: true };
    }
    const button = await waitFor(ARGS.submitSelector, ARGS.submitWaitMs, ARGS.submitIntervalMs, (el) => !isDisabled(el));
    if (!button) return { success: false, reason: 'submit_not_found' };
    button.el.click();
    return { success: true, submitted: true, waitedMs: button.waited };
  } catch (e) {
    return failure(e);
  }
"#;

/// Install click-to-pick instrumentation; reports go to the console.
pub(super) const PICKER_INSTALL: &str = r#"
  try {
    if (window.__sidechatPicker) window.__sidechatPicker.teardown();
    const picked = { input: null, submit: null };
    const describe = (el) => {
      const tag = el.tagName.toLowerCase();
      if (el.id && /^[A-Za-z][\w-]*$/.test(el.id)) return tag + '#' + el.id;
      for (const attr of ['data-testid', 'aria-label', 'name', 'placeholder']) {
        const value = el.getAttribute(attr);
        if (value && /^[\w .:-]+$/.test(value)) return tag + '[' + attr + '=\'' + value + '\']';
      }
      if (el.isContentEditable) return tag + '[contenteditable=\'true\']';
      const classes = Array.from(el.classList).filter((c) => /^[A-Za-z][\w-]*$/.test(c)).slice(0, 2);
      return classes.length ? tag + '.' + classes.join('.') : tag;
    };
    const banner = document.createElement('div');
    banner.setAttribute('data-sidechat-picker', ARGS.token);
    banner.style.cssText = 'position:fixed;top:12px;left:50%;transform:translateX(-50%);' +
      'z-index:2147483647;padding:8px 14px;border-radius:6px;background:#1f2937;' +
      'color:#fff;font:13px sans-serif;pointer-events:none';
    banner.textContent = ARGS.promptInput;
    document.documentElement.appendChild(banner);
    let hovered = null;
    const report = (payload) =>
      console.log(ARGS.prefix + JSON.stringify(Object.assign({ token: ARGS.token }, payload)));
    const onOver = (e) => {
      if (hovered) hovered.style.outline = '';
      hovered = e.target;
      hovered.style.outline = '2px solid #4f8cff';
    };
    const onClick = (e) => {
      e.preventDefault();
      e.stopPropagation();
      const selector = describe(e.target);
      if (!picked.input) {
        picked.input = selector;
        banner.textContent = ARGS.promptSubmit;
        return;
      }
      picked.submit = selector;
      report({ input: picked.input, submit: picked.submit });
      teardown();
    };
    const onKey = (e) => {
      if (e.key === 'Escape') {
        report({ cancelled: true });
        teardown();
      }
    };
    const teardown = () => {
      document.removeEventListener('mouseover', onOver, true);
      document.removeEventListener('click', onClick, true);
      document.removeEventListener('keydown', onKey, true);
      if (hovered) hovered.style.outline = '';
      banner.remove();
      delete window.__sidechatPicker;
    };
    document.addEventListener('mouseover', onOver, true);
    document.addEventListener('click', onClick, true);
    document.addEventListener('keydown', onKey, true);
    window.__sidechatPicker = { token: ARGS.token, teardown };
    return { success: true };
  } catch (e) {
    return failure(e);
  }
"#;

/// Remove any picker instrumentation, whichever session installed it.
pub(super) const PICKER_REMOVE: &str = r#"
  try {
    const active = window.__sidechatPicker;
    if (active) active.teardown();
    document.querySelectorAll('[data-sidechat-picker]').forEach((node) => node.remove());
    return { success: true, removed: !!active };
  } catch (e) {
    return failure(e);
  }
"#;
