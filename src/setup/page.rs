//! The static setup page served under `/__setup/`.

pub const SETUP_HTML: &str = r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Clawdbot Setup</title>
    <style>
      :root { --bg:#0b0f14; --panel:#111823; --text:#e7eef7; --muted:#9fb1c5; --acc:#ff5a2d; --line:#223043; }
      @media (prefers-color-scheme: light) { :root { --bg:#f6f8fb; --panel:#ffffff; --text:#132033; --muted:#4d637a; --line:#e2e8f0; } }
      body { margin:0; font: 14px/1.5 system-ui, sans-serif; background:var(--bg); color:var(--text); }
      .wrap { max-width: 980px; margin: 0 auto; padding: 20px; }
      .hero { display:flex; gap:16px; justify-content:space-between; align-items:flex-start; }
      .hero h1 { margin:0 0 4px; font-size:20px; }
      .card { background:var(--panel); border:1px solid var(--line); border-radius:12px; padding:16px; margin-top:14px; }
      .row { display:flex; gap:12px; flex-wrap:wrap; }
      .col { flex:1; min-width:280px; }
      label { display:block; font-weight:600; margin:10px 0 6px; }
      input, textarea { width:100%; box-sizing:border-box; padding:10px 12px; border-radius:10px; border:1px solid var(--line); background:transparent; color:var(--text); }
      textarea { min-height:110px; font-family: ui-monospace, monospace; }
      button { border:1px solid var(--line); background:transparent; color:var(--text); padding:10px 12px; border-radius:10px; cursor:pointer; }
      button.primary { background: color-mix(in oklab, var(--acc) 20%, transparent); }
      .pill { padding:4px 8px; border-radius:999px; border:1px solid var(--line); color:var(--muted); }
      pre { padding:12px; border-radius:10px; border:1px solid var(--line); overflow:auto; }
      .muted { color:var(--muted); }
      .ok { color:#2fbf71; }
      .warn { color:#ffb020; }
    </style>
  </head>
  <body>
    <div class="wrap">
      <div class="hero">
        <div>
          <h1>Clawdbot Setup</h1>
          <p class="muted">Run the onboarding wizard or store API keys without a shell.</p>
        </div>
        <div class="pill" id="statusPill">Loading status…</div>
      </div>

      <div class="card">
        <div class="row">
          <div class="col">
            <h2>1) Wizard (recommended)</h2>
            <div class="row">
              <button class="primary" id="btnWizardStart">Start wizard</button>
              <button id="btnWizardStatus">Status</button>
              <button id="btnWizardNext">Next</button>
              <button id="btnWizardCancel">Cancel</button>
            </div>
            <label for="gatewayToken">Gateway token (only if gateway auth is enabled)</label>
            <input id="gatewayToken" type="password" placeholder="leave empty if not needed" />
            <label for="wizardNextParams">Wizard next (JSON)</label>
            <textarea id="wizardNextParams" placeholder='{"choice":"openai-codex"}'></textarea>
          </div>
          <div class="col">
            <h2>2) API keys (fallback)</h2>
            <label for="anthropicKey">Anthropic API key</label>
            <input id="anthropicKey" type="password" placeholder="sk-ant-…" />
            <label for="openaiKey">OpenAI API key</label>
            <input id="openaiKey" type="password" placeholder="sk-…" />
            <div class="row" style="margin-top:10px">
              <button class="primary" id="btnSaveKeys">Save keys</button>
              <button id="btnCheckModels">Model/auth status</button>
            </div>
            <p class="muted">Keys are never displayed again and never logged.</p>
          </div>
        </div>
      </div>

      <div class="card">
        <h2>Output</h2>
        <pre id="out">(no output yet)</pre>
        <div id="wizardHelper"></div>
      </div>

      <div class="card">
        <a href="/">Open the Control UI</a>
      </div>
    </div>

    <script>
      const out = document.getElementById('out');
      const pill = document.getElementById('statusPill');
      const token = document.getElementById('gatewayToken');
      const helper = document.getElementById('wizardHelper');

      function setOut(v) { out.textContent = typeof v === 'string' ? v : JSON.stringify(v, null, 2); }

      async function api(path, opts) {
        const res = await fetch('/__setup/api' + path, { headers: { 'content-type': 'application/json' }, ...opts });
        const text = await res.text();
        let json = null;
        try { json = JSON.parse(text); } catch {}
        if (!res.ok && !(json && 'ok' in json && 'code' in json)) {
          throw new Error((json && json.error) ? json.error : text || ('HTTP ' + res.status));
        }
        return json ?? text;
      }

      function post(path, extra) {
        return api(path, { method: 'POST', body: JSON.stringify({ token: token.value || null, ...extra }) });
      }

      function renderActions(r) {
        helper.innerHTML = '';
        const actions = (r && Array.isArray(r.actions)) ? r.actions.slice(0, 8) : [];
        for (const a of actions) {
          const btn = document.createElement('button');
          btn.className = 'primary';
          btn.textContent = a.label;
          btn.addEventListener('click', () => run('Wizard next…', () => post('/wizard/next', { params: a.params }), true));
          helper.appendChild(btn);
        }
      }

      async function run(label, fn, withActions) {
        setOut(label);
        try {
          const r = await fn();
          setOut(r);
          withActions ? renderActions(r) : renderActions(null);
        } catch (e) {
          setOut('Error: ' + e.message);
          renderActions(null);
        } finally { refreshPill(); }
      }

      async function refreshPill() {
        try {
          const env = await api('/env', { method: 'GET' });
          pill.textContent = [env.configExists ? 'Config: ok' : 'Config: missing', env.activeDirExists ? 'Build: ok' : 'Build: missing'].join(' · ');
          pill.className = 'pill ' + (env.configExists ? 'ok' : 'warn');
        } catch (e) {
          pill.textContent = 'Status: error';
          pill.className = 'pill warn';
        }
      }

      document.getElementById('btnWizardStart').onclick = () => run('Starting wizard…', () => post('/wizard/start', {}), true);
      document.getElementById('btnWizardStatus').onclick = () => run('Loading status…', () => post('/wizard/status', {}), true);
      document.getElementById('btnWizardCancel').onclick = () => run('Cancelling wizard…', () => post('/wizard/cancel', {}), false);
      document.getElementById('btnWizardNext').onclick = () => run('Wizard next…', () => {
        let params;
        try { params = JSON.parse(document.getElementById('wizardNextParams').value || '{}'); }
        catch { throw new Error('Invalid JSON in "Wizard next"'); }
        return post('/wizard/next', { params });
      }, true);
      document.getElementById('btnSaveKeys').onclick = () => run('Saving keys…', async () => {
        const anthropic = document.getElementById('anthropicKey');
        const openai = document.getElementById('openaiKey');
        const r = await api('/keys', { method: 'POST', body: JSON.stringify({ anthropicKey: anthropic.value || null, openaiKey: openai.value || null }) });
        anthropic.value = '';
        openai.value = '';
        return r;
      }, false);
      document.getElementById('btnCheckModels').onclick = () => run('Loading model/auth status…', () => api('/models/status', { method: 'GET' }), false);

      refreshPill();
      setInterval(refreshPill, 5000);
    </script>
  </body>
</html>
"#;
