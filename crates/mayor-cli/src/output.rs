use mayor_core::evaluator::Verdict;
use mayor_core::policy::PolicyWarning;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let line = |cells: Vec<String>| {
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{cell:w$}")
            })
            .collect();
        println!("{}", padded.join("  ").trim_end());
    };

    line(headers.iter().map(|h| h.to_string()).collect());
    line(widths.iter().map(|&w| "-".repeat(w)).collect());
    for row in rows {
        line(row);
    }
}

pub fn print_warnings(warnings: &[PolicyWarning]) {
    for w in warnings {
        println!("[warning] {}: {}", w.path, w.message);
    }
}

pub fn print_verdict(verdict: &Verdict) {
    if verdict.full_bypass {
        println!("PASSED (all checks bypassed by label)");
    } else if verdict.passed {
        println!("PASSED");
    } else {
        println!("FAILED ({} violation(s))", verdict.violations.len());
    }
    if !verdict.violations.is_empty() {
        let rows = verdict
            .violations
            .iter()
            .map(|v| {
                vec![
                    v.severity.to_string(),
                    v.rule.clone(),
                    v.message.clone(),
                ]
            })
            .collect();
        print_table(&["SEVERITY", "RULE", "MESSAGE"], rows);
    }
    if !verdict.bypassed.is_empty() && !verdict.full_bypass {
        let bypassed: Vec<&str> = verdict.bypassed.iter().map(String::as_str).collect();
        println!("Bypassed: {}", bypassed.join(", "));
    }
    print_warnings(&verdict.warnings);
}
