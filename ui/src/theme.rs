pub const GLOBAL_CSS: &str = r#"
:root {
  --bg: #05090f;
  --panel: #0d1520;
  --border: rgba(255, 255, 255, 0.08);
  --text: #e6edf7;
  --text-muted: #7f8ba0;
  --accent: #5cb0ff;
  --negative: #f0635c;
  --warning: #f7c843;
  --radius: 10px;
  --space-2: 8px;
  --space-3: 12px;
  --space-4: 16px;
  --font-body: "Inter", "SF Pro Text", system-ui, -apple-system, sans-serif;
  --font-mono: "JetBrains Mono", "SFMono-Regular", ui-monospace, monospace;
}

* { box-sizing: border-box; }
html, body {
  padding: 0;
  margin: 0;
  background: var(--bg);
  color: var(--text);
  font-family: var(--font-body);
  font-size: 14px;
}

.dashboard {
  display: grid;
  grid-template-columns: 280px 1fr;
  gap: var(--space-3);
  padding: var(--space-3);
  min-height: 100vh;
}

.panel {
  background: var(--panel);
  border: 1px solid var(--border);
  border-radius: var(--radius);
  padding: var(--space-3);
}

.section-label {
  font-size: 11px;
  letter-spacing: 0.08em;
  text-transform: uppercase;
  color: var(--text-muted);
  margin-bottom: var(--space-2);
}

.flex-row { display: flex; align-items: center; gap: var(--space-2); }
.flex-col { display: flex; flex-direction: column; gap: var(--space-2); }

.muted { color: var(--text-muted); }
.error-note { color: var(--negative); }
.warning-note { color: var(--warning); }

select, input, button {
  background: var(--bg);
  color: var(--text);
  border: 1px solid var(--border);
  border-radius: 6px;
  padding: 6px 8px;
  font-family: inherit;
}

button { cursor: pointer; }
button:hover { border-color: var(--accent); }

.summary-table {
  width: 100%;
  border-collapse: collapse;
  font-family: var(--font-mono);
  font-size: 12px;
}
.summary-table td {
  border-bottom: 1px solid var(--border);
  padding: 3px 6px;
}
.summary-table td:first-child { color: var(--text-muted); }

#chart-window { min-height: 480px; }
"#;
