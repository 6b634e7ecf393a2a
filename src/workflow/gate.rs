//! Human-input gates
//!
//! A gated task stops at `AwaitingInput` until a submission carries a
//! non-empty value for every required field. Validation is pure; the
//! scheduler applies the transition.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use super::definition::{InputKind, TaskSpec};
use crate::{Error, Result};

/// Check a submission against a task's gate fields.
///
/// Returns `MissingRequiredFields` listing every required label (in
/// declaration order) whose value is absent or blank.
pub fn validate_submission(spec: &TaskSpec, values: &BTreeMap<String, String>) -> Result<()> {
    let missing: Vec<String> = spec
        .required_fields()
        .filter(|label| {
            values
                .get(*label)
                .map(|v| v.trim().is_empty())
                .unwrap_or(true)
        })
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingRequiredFields { fields: missing })
    }
}

/// Parse `Label=value` pairs as given on the command line
pub fn parse_field_args(args: &[String]) -> Result<BTreeMap<String, String>> {
    args.iter()
        .map(|arg| {
            arg.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .ok_or_else(|| {
                    Error::Config(format!("Expected Label=value, got: {}", arg))
                })
        })
        .collect()
}

/// CLI gate interaction
pub struct CliGate;

impl CliGate {
    /// Prompt for a gated task's fields on stdin
    pub fn prompt(spec: &TaskSpec) -> Result<BTreeMap<String, String>> {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        Self::prompt_with(spec, &mut stdin.lock(), &mut stdout.lock())
    }

    /// Prompt using the given reader and writer.
    ///
    /// Required fields are asked again until answered. End of input stops
    /// prompting and returns what was collected so far.
    pub fn prompt_with<R: BufRead, W: Write>(
        spec: &TaskSpec,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<BTreeMap<String, String>> {
        writeln!(writer, "\n{}", "─".repeat(60))?;
        writeln!(writer, "✋ {} requires review", spec.name)?;
        writeln!(writer, "{}", "─".repeat(60))?;
        if let Some(prompt) = &spec.prompt {
            writeln!(writer, "\n{}\n", prompt)?;
        }

        let mut values = BTreeMap::new();
        for field in &spec.input_fields {
            loop {
                let marker = if field.required { " *" } else { "" };
                match (field.kind, field.options.is_empty()) {
                    (InputKind::Select, false) => writeln!(
                        writer,
                        "{}{} [{}]",
                        field.label,
                        marker,
                        field.options.join(" / ")
                    )?,
                    _ => writeln!(writer, "{}{}", field.label, marker)?,
                }
                write!(writer, "> ")?;
                writer.flush()?;

                let mut line = String::new();
                if reader.read_line(&mut line)? == 0 {
                    return Ok(values);
                }

                let value = line.trim();
                if value.is_empty() {
                    if field.required {
                        writeln!(writer, "{} is required", field.label)?;
                        continue;
                    }
                    break;
                }

                values.insert(field.label.clone(), value.to_string());
                break;
            }
        }

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::definition::InputField;

    fn gated() -> TaskSpec {
        TaskSpec::new("b", "B").with_gate(
            "Confirm the billing data",
            vec![
                InputField::required("Confirm", InputKind::Select).with_options(&["yes", "no"]),
                InputField::optional("Notes", InputKind::Multiline),
                InputField::required("Outcome", InputKind::Text),
            ],
        )
    }

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_fields_in_declaration_order() {
        let err = validate_submission(&gated(), &BTreeMap::new()).unwrap_err();
        match err {
            Error::MissingRequiredFields { fields } => {
                assert_eq!(fields, vec!["Confirm", "Outcome"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let result = validate_submission(&gated(), &values(&[("Confirm", "  "), ("Outcome", "ok")]));
        assert!(matches!(
            result,
            Err(Error::MissingRequiredFields { fields }) if fields == vec!["Confirm"]
        ));
    }

    #[test]
    fn test_complete_submission_accepted() {
        let submission = values(&[("Confirm", "yes"), ("Outcome", "resolved")]);
        assert!(validate_submission(&gated(), &submission).is_ok());
        assert!(validate_submission(&TaskSpec::new("x", "X"), &BTreeMap::new()).is_ok());
    }

    #[test]
    fn test_parse_field_args() {
        let parsed = parse_field_args(&[
            "Confirm=yes".to_string(),
            "Notes=a=b".to_string(),
        ])
        .unwrap();
        assert_eq!(parsed["Confirm"], "yes");
        assert_eq!(parsed["Notes"], "a=b");
        assert!(parse_field_args(&["nonsense".to_string()]).is_err());
    }

    #[test]
    fn test_prompt_reasks_required_fields() {
        let mut input = "\nyes\n\nresolved\n".as_bytes();
        let mut output = Vec::new();

        let collected = CliGate::prompt_with(&gated(), &mut input, &mut output).unwrap();
        assert_eq!(collected, values(&[("Confirm", "yes"), ("Outcome", "resolved")]));

        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("Confirm is required"));
        assert!(shown.contains("[yes / no]"));
    }

    #[test]
    fn test_prompt_stops_at_end_of_input() {
        let mut input = "yes\n".as_bytes();
        let mut output = Vec::new();

        let collected = CliGate::prompt_with(&gated(), &mut input, &mut output).unwrap();
        assert_eq!(collected, values(&[("Confirm", "yes")]));
    }
}
