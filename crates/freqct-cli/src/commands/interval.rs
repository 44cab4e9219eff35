use freqct_core::base::conf_intervals;
use freqct_core::{CtableError, calc_ipm};
use freqct_stats::wilson_conf_interval;

pub fn run(abs: u64, total: u64, alpha: &str) -> Result<(), CtableError> {
    let level = super::parse_alpha(alpha)?;
    let (lo, hi) = wilson_conf_interval(abs, total, level);
    let (abs_ci, ipm_ci) = conf_intervals(abs, total, level, true);
    let (ipm_lo, ipm_hi) = ipm_ci.unwrap_or_default();

    println!("abs {abs} of {total} at alpha {level}");
    println!("  proportion  {:<12.6} [{lo:.6}, {hi:.6}]", abs.min(total) as f64 / total.max(1) as f64);
    println!("  abs         {abs:<12} [{:.2}, {:.2}]", abs_ci.0, abs_ci.1);
    println!("  ipm         {:<12.2} [{ipm_lo:.2}, {ipm_hi:.2}]", calc_ipm(abs, total));
    Ok(())
}
