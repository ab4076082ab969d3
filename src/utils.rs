use indicatif::ProgressStyle;
use ndarray::{ArrayViewMut1, NdFloat};

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {per_sec} {msg}",
    )
    .expect("failed to build progress style")
}

/// 原地对向量做 L2 归一化，返回范数是否非零
pub fn l2_normalize<A: NdFloat>(mut v: ArrayViewMut1<A>) -> bool {
    let norm = v.dot(&v).sqrt();
    if !norm.is_finite() || norm <= A::zero() {
        return false;
    }
    v /= norm;
    true
}
