//! GNU MathProg rendering of an [`LpModel`].

use std::fmt::Write;

use crate::model::{LpModel, Relation};
use crate::SolverError;

/// Renders `model` as a GMPL program.
///
/// Variables are declared in model order, so column `j` of the solved
/// problem is model variable `j - 1`.
pub fn render(model: &LpModel) -> Result<String, SolverError> {
	let mut out = String::new();
	let names: Vec<String> = model.variables().iter().map(|v| v.name()).collect();
	for name in &names {
		if !is_symbolic_name(name) {
			return Err(SolverError::InvalidModel(format!(
				"{} is not a valid MathProg name",
				name
			)));
		}
		push_line(&mut out, format_args!("var {} >= 0;", name))?;
	}

	let objective: Vec<(usize, f64)> = model.objective().iter().map(|(i, c)| (*i, *c)).collect();
	push_line(
		&mut out,
		format_args!("maximize z: {};", linear_form(&objective, &names)?),
	)?;

	for (n, constraint) in model.constraints().iter().enumerate() {
		let relation = match constraint.relation {
			Relation::Le => "<=",
			Relation::Ge => ">=",
		};
		push_line(
			&mut out,
			format_args!(
				"subject to c{}: {} {} {};",
				n + 1,
				linear_form(&constraint.terms, &names)?,
				relation,
				constraint.rhs
			),
		)?;
	}
	push_line(&mut out, format_args!("end;"))?;
	Ok(out)
}

fn push_line(out: &mut String, line: std::fmt::Arguments<'_>) -> Result<(), SolverError> {
	out.write_fmt(line)
		.and_then(|_| out.write_char('\n'))
		.map_err(|e| SolverError::InvalidModel(e.to_string()))
}

fn linear_form(terms: &[(usize, f64)], names: &[String]) -> Result<String, SolverError> {
	if terms.is_empty() {
		return Ok("0".to_string());
	}
	let mut parts = Vec::with_capacity(terms.len());
	for (index, coefficient) in terms {
		let name = names.get(*index).ok_or_else(|| {
			SolverError::InvalidModel(format!("term refers to unknown variable {}", index))
		})?;
		let sign = if *coefficient < 0.0 { '-' } else { '+' };
		parts.push(format!("{} {} {}", sign, coefficient.abs(), name));
	}
	Ok(parts.join(" "))
}

fn is_symbolic_name(name: &str) -> bool {
	let mut chars = name.chars();
	matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
		&& chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
