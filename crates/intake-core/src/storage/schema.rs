pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS form_templates (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  study_id TEXT NOT NULL,
  name TEXT NOT NULL,
  version INTEGER NOT NULL DEFAULT 1,
  status TEXT NOT NULL DEFAULT 'draft',
  created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_form_templates_study ON form_templates(study_id);

CREATE TABLE IF NOT EXISTS form_fields (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  form_template_id INTEGER NOT NULL REFERENCES form_templates(id),
  key TEXT NOT NULL,
  label TEXT NOT NULL,
  type TEXT NOT NULL,
  required INTEGER NOT NULL DEFAULT 0,
  options TEXT,
  validation TEXT,
  order_index INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_form_fields_template ON form_fields(form_template_id);

CREATE TABLE IF NOT EXISTS form_logic (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  form_template_id INTEGER NOT NULL REFERENCES form_templates(id),
  logic TEXT NOT NULL,
  order_index INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_form_logic_template ON form_logic(form_template_id);

CREATE TABLE IF NOT EXISTS compute_definitions (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  study_id TEXT NOT NULL,
  key TEXT NOT NULL,
  type TEXT NOT NULL,
  definition TEXT NOT NULL,
  version INTEGER NOT NULL DEFAULT 1,
  status TEXT NOT NULL DEFAULT 'published'
);
CREATE INDEX IF NOT EXISTS idx_compute_definitions_study ON compute_definitions(study_id);

CREATE TABLE IF NOT EXISTS rule_sets (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  study_id TEXT NOT NULL,
  rule_type TEXT NOT NULL,
  name TEXT NOT NULL,
  version INTEGER NOT NULL DEFAULT 1,
  status TEXT NOT NULL DEFAULT 'published',
  expression TEXT NOT NULL,
  created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_rule_sets_study ON rule_sets(study_id);

CREATE TABLE IF NOT EXISTS form_submissions (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  study_id TEXT NOT NULL,
  participant_id TEXT NOT NULL,
  form_template_id INTEGER NOT NULL REFERENCES form_templates(id),
  answers TEXT NOT NULL,
  submitted_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_form_submissions_participant
  ON form_submissions(study_id, participant_id);

CREATE TABLE IF NOT EXISTS computed_values (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  submission_id INTEGER NOT NULL REFERENCES form_submissions(id),
  key TEXT NOT NULL,
  value TEXT,
  computed_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_computed_values_submission ON computed_values(submission_id);

CREATE TABLE IF NOT EXISTS rule_evaluations (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  submission_id INTEGER NOT NULL REFERENCES form_submissions(id),
  rule_set_id INTEGER NOT NULL REFERENCES rule_sets(id),
  result INTEGER NOT NULL,
  detail TEXT,
  evaluated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_rule_evaluations_submission ON rule_evaluations(submission_id);

CREATE TABLE IF NOT EXISTS participant_assignments (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  participant_id TEXT NOT NULL,
  study_id TEXT NOT NULL,
  group_key TEXT NOT NULL,
  group_value TEXT NOT NULL,
  assigned_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_participant_assignments_participant
  ON participant_assignments(study_id, participant_id);

CREATE TABLE IF NOT EXISTS schedule_plans (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  participant_id TEXT NOT NULL,
  study_id TEXT NOT NULL,
  plan TEXT NOT NULL,
  created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_schedule_plans_participant
  ON schedule_plans(study_id, participant_id);

CREATE TABLE IF NOT EXISTS audit_logs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  study_id TEXT,
  participant_id TEXT,
  action TEXT NOT NULL,
  entity_type TEXT NOT NULL,
  entity_id INTEGER,
  detail TEXT,
  created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_logs_study ON audit_logs(study_id);
"#;
