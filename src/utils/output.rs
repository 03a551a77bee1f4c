//! # 美化输出工具
//!
//! 统一的终端输出样式：每行以带颜色的标签开头。
//! 错误写到 stderr，其余写到 stdout。
//!
//! ## 依赖关系
//! - 被 `commands/` 模块和 `main.rs` 使用
//! - 使用 `colored` crate

use colored::{ColoredString, Colorize};

/// 分隔线宽度
const RULE_WIDTH: usize = 60;

fn tagged(tag: ColoredString, msg: &str) -> String {
    format!("{} {}", tag, msg)
}

/// 打印成功消息
pub fn print_success(msg: &str) {
    println!("{}", tagged("[OK]".green().bold(), msg));
}

/// 打印错误消息
pub fn print_error(msg: &str) {
    eprintln!("{}", tagged("[ERR]".red().bold(), msg));
}

/// 打印警告消息
pub fn print_warning(msg: &str) {
    println!("{}", tagged("[WARN]".yellow().bold(), msg));
}

/// 打印信息消息
pub fn print_info(msg: &str) {
    println!("{}", tagged("[*]".blue().bold(), msg));
}

/// 打印批次完成消息
pub fn print_done(msg: &str) {
    println!("{}", tagged("[DONE]".green().bold(), msg));
}

/// 打印一条转换计划
pub fn print_conversion(input: &str, output: &str) {
    let plan = format!("{} {} {}", input.dimmed(), "->".cyan(), output);
    println!("{}", tagged("[PLAN]".blue().bold(), &plan));
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let rule = "─".repeat(RULE_WIDTH);
    println!("\n{}\n  {}\n{}\n", rule.dimmed(), title.bold(), rule.dimmed());
}

/// 打印分隔线
pub fn print_separator() {
    println!("{}", "─".repeat(RULE_WIDTH).dimmed());
}
