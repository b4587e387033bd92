use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, Table};

use crate::runner::types::{ScenarioResult, StepOutcome, StepResult, SuiteResult, SuiteSummary};
use crate::scenario::Scenario;
use crate::utils::{ResponseFormat, ResponseFormatter};

pub struct ContractReporter {
    verbose: bool,
    formatter: ResponseFormatter,
}

impl ContractReporter {
    pub fn new(verbose: bool) -> Self {
        let format = if verbose {
            ResponseFormat::Verbose
        } else {
            ResponseFormat::Compact
        };

        Self {
            verbose,
            formatter: ResponseFormatter::new(format),
        }
    }

    /// 打印测试开始
    pub fn print_header(&self, base_url: &str, total: usize) {
        println!(
            "\nRunning {} contract scenario(s) against {}...\n",
            total,
            base_url.bold()
        );
    }

    /// 打印完整套件结果
    pub fn print_suite(&self, suite: &SuiteResult) {
        for scenario in &suite.scenarios {
            self.print_scenario(scenario);
        }
        self.print_summary(&suite.summary);
    }

    /// 打印单个场景结果
    pub fn print_scenario(&self, result: &ScenarioResult) {
        let symbol = if result.passed {
            "✓".green()
        } else {
            "✗".red()
        };
        println!(
            " {} {} {}",
            symbol,
            result.name.bold(),
            format!("({}ms)", result.duration.as_millis()).dimmed()
        );

        if let Some(error) = &result.error {
            println!("   {}: {}", "Error".red().bold(), error);
        }

        // verbose 模式或失败时展开步骤
        if self.verbose || !result.passed {
            if !result.description.is_empty() {
                println!("   {}", result.description.dimmed());
            }
            for step in &result.steps {
                self.print_step(step);
            }
            println!();
        }
    }

    fn print_step(&self, step: &StepResult) {
        let status = step
            .status
            .map(|s| format!(" → {}", s))
            .unwrap_or_default();

        match step.outcome {
            StepOutcome::Skipped => {
                println!(
                    "   {} [{}] {} {} {}",
                    "⊘".dimmed(),
                    step.id,
                    step.method.cyan(),
                    step.url,
                    "(skipped)".dimmed()
                );
                return;
            }
            StepOutcome::Passed => println!(
                "   {} [{}] {} {}{} ({}ms)",
                "✓".green(),
                step.id,
                step.method.cyan(),
                step.url,
                status,
                step.duration.as_millis()
            ),
            StepOutcome::Failed => println!(
                "   {} [{}] {} {}{} ({}ms)",
                "✗".red(),
                step.id,
                step.method.cyan(),
                step.url,
                status,
                step.duration.as_millis()
            ),
        }

        for failure in &step.failures {
            println!(
                "     {} expected {}, got {}",
                format!("[{}]", failure.kind).red().bold(),
                failure.expected,
                failure.actual
            );
            println!("       {}", failure.message.red());
        }

        if self.verbose {
            for assertion in &step.assertions {
                let mark = if assertion.passed {
                    "✓".green()
                } else {
                    "✗".red()
                };
                println!("     {} {}", mark, assertion.description);
            }
            for (name, value) in &step.captured {
                println!("     {} {} = {}", "↳".cyan(), name, value);
            }
        }

        if (self.verbose || !step.passed())
            && let Some(response) = &step.response
        {
            for line in self.formatter.format(response).lines() {
                println!("       {}", line);
            }
        }
    }

    /// 打印测试摘要
    pub fn print_summary(&self, summary: &SuiteSummary) {
        println!("\n{}", "━".repeat(50));
        println!("{}", "Summary".bold());
        println!("{}", "━".repeat(50));

        if summary.failed == 0 {
            println!(
                "  {}: {} passed, {} total",
                "Scenarios".bold(),
                summary.passed.to_string().green(),
                summary.total
            );
        } else {
            println!(
                "  {}: {} passed, {} failed, {} total",
                "Scenarios".bold(),
                summary.passed.to_string().green(),
                summary.failed.to_string().red(),
                summary.total
            );
        }

        if summary.steps_skipped > 0 {
            println!(
                "  {}: {} failed, {} skipped, {} total",
                "Steps".bold(),
                summary.steps_failed.to_string().red(),
                summary.steps_skipped.to_string().dimmed(),
                summary.steps_total
            );
        } else {
            println!(
                "  {}: {} failed, {} total",
                "Steps".bold(),
                summary.steps_failed,
                summary.steps_total
            );
        }

        if summary.total_assertions > 0 {
            println!(
                "  {}: {} passed, {} failed, {} total",
                "Assertions".bold(),
                summary.passed_assertions.to_string().green(),
                summary.failed_assertions,
                summary.total_assertions
            );
        }

        println!(
            "  {}: {:.3}s",
            "Duration".bold(),
            summary.total_duration.as_secs_f64()
        );
        println!();
    }

    pub fn print_json(&self, suite: &SuiteResult) -> crate::Result<()> {
        println!("{}", serde_json::to_string_pretty(suite)?);
        Ok(())
    }
}

impl Default for ContractReporter {
    fn default() -> Self {
        Self::new(false)
    }
}

/// 场景列表表格
pub fn scenario_table(scenarios: &[Scenario]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Scenario", "Steps", "Exclusive", "Expected outcome"]);

    for scenario in scenarios {
        let steps = scenario
            .steps
            .iter()
            .map(|s| format!("{} {} → {}", s.method, s.path, s.expect_status))
            .collect::<Vec<_>>()
            .join("\n");

        let exclusive = if scenario.exclusive {
            Cell::new("yes").fg(Color::Yellow)
        } else {
            Cell::new("no")
        };

        table.add_row(vec![
            Cell::new(&scenario.name).add_attribute(Attribute::Bold),
            Cell::new(steps),
            exclusive,
            Cell::new(&scenario.description).add_attribute(Attribute::Dim),
        ]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::catalog;

    #[test]
    fn test_scenario_table_lists_every_scenario() {
        let scenarios = catalog::user_api().unwrap();
        let rendered = scenario_table(&scenarios).to_string();

        for scenario in &scenarios {
            assert!(rendered.contains(&scenario.name));
        }
        assert!(rendered.contains("DELETE /users/{user_id} → 204"));
    }
}
