use colored::{control, Colorize};

use crate::core::formatter::{format_brl, FormattedSnapshot, PENDING};
use crate::core::models::state::WeeklyCostState;

/// Render the dashboard figures as a colored (or plain) block.
///
/// Layout:
/// ```text
///  Dialer costs
///   Balance    R$ 5665,28
///   Today      R$ 12,00
///   Week       R$ 112,00
///   Collected  2024-06-05T18:30:00-03:00
/// ```
pub fn render_snapshot(formatted: &FormattedSnapshot, use_color: bool) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = Vec::new();
    lines.push(" Dialer costs".bold().to_string());

    if formatted.custo_semanal == PENDING {
        lines.push(format!("  {}", "No sample collected yet".yellow()));
        return lines.join("\n");
    }

    lines.push(format!("  {}    {}", "Balance".cyan(), formatted.saldo_atual));
    lines.push(format!("  {}      {}", "Today".cyan(), formatted.custo_diario));
    lines.push(format!(
        "  {}       {}",
        "Week".cyan(),
        formatted.custo_semanal.bold()
    ));
    lines.push(format!("  {}  {}", "Collected".cyan(), formatted.data_coleta));
    lines.join("\n")
}

/// Render the raw accumulator state for operators.
pub fn render_state(state: &WeeklyCostState, use_color: bool) -> String {
    control::set_override(use_color);

    let weekday = state
        .last_sample_weekday
        .map(|d| d.to_string())
        .unwrap_or_else(|| "unset".to_string());

    [
        " Weekly cost state".bold().to_string(),
        format!("  {}  {}", "Prior days".cyan(), format_brl(state.accumulated_prior_days)),
        format!("  {}   {}", "Last daily".cyan(), format_brl(state.last_daily_cost_seen)),
        format!("  {} {}", "Weekly total".cyan(), format_brl(state.weekly_total())),
        format!("  {}  {}", "Last sample".cyan(), weekday),
        format!("  {}    {}", "Revision".cyan(), state.revision),
    ]
    .join("\n")
}
