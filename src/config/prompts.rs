//! Instruction prompts sent with every step.
//!
//! Each request is self-contained, so the instruction carries the goal and
//! the full action vocabulary every time.

use chrono::{Datelike, Local};

/// Build the instruction text for a goal.
pub fn instruction_prompt(lang: &str, goal: &str) -> String {
    match lang {
        "en" => instruction_prompt_en(goal),
        _ => instruction_prompt_zh(goal),
    }
}

/// Build the per-step text that precedes the screenshot.
pub fn step_prompt(lang: &str, step: u32) -> String {
    match lang {
        "en" => format!(
            "Screenshot for step {}. Output exactly one instruction:",
            step
        ),
        _ => format!("当前截图第{}步，只输出一条指令：", step),
    }
}

fn instruction_prompt_zh(goal: &str) -> String {
    let today = Local::now();
    let weekday_names = [
        "星期一",
        "星期二",
        "星期三",
        "星期四",
        "星期五",
        "星期六",
        "星期日",
    ];
    let weekday = weekday_names[today.weekday().num_days_from_monday() as usize];
    let formatted_date = format!(
        "{}年{}月{}日 {}",
        today.format("%Y"),
        today.format("%m"),
        today.format("%d"),
        weekday
    );

    format!(
        "今天的日期是: {}\n任务：{}\n{}",
        formatted_date, goal, ACTIONS_ZH
    )
}

fn instruction_prompt_en(goal: &str) -> String {
    let formatted_date = Local::now().format("%B %d, %Y").to_string();

    format!(
        "Today's date is: {}\nTask: {}\n{}",
        formatted_date, goal, ACTIONS_EN
    )
}

/// Chinese action vocabulary (without header)
pub static ACTIONS_ZH: &str = r#"你是手机操作助手，根据当前截图决定完成任务的下一步操作。

【坐标说明】
坐标使用 0-1000 的归一化坐标：屏幕左上角为 [0,0]，右下角为 [1000,1000]，与实际分辨率无关。

【指令格式】
do(action="Launch", app="设置")
    直接启动应用，比从桌面查找更快。
do(action="Tap", element=[x,y])
    点击屏幕上的一点。
do(action="Swipe", start=[x1,y1], end=[x2,y2])
    从起点滑动到终点，用于滚动页面。
do(action="Input", text="xxx")
    在当前输入框中输入文字，会替换原有内容。键盘弹出后直接使用 Input，不要点击键盘字母。
do(action="Back")
    返回上一页。
do(action="Home")
    回到系统桌面。
finish(message="xxx")
    任务已完成。

【规则】
- 只输出一条指令！
- 看到搜索框先点击它，再使用 Input 输入。
- 如果页面没有变化，调整坐标后重试，不要重复同一操作。
"#;

/// English action vocabulary (without header)
pub static ACTIONS_EN: &str = r#"You are a phone operation assistant. Look at the current screenshot and decide the next operation toward the task.

[Coordinates]
Coordinates are normalized to 0-1000: the top-left corner is [0,0] and the bottom-right corner is [1000,1000], regardless of the real resolution.

[Instruction format]
do(action="Launch", app="Settings")
    Start an app directly, faster than finding it on the home screen.
do(action="Tap", element=[x,y])
    Tap one point on the screen.
do(action="Swipe", start=[x1,y1], end=[x2,y2])
    Swipe from start to end, used to scroll.
do(action="Input", text="xxx")
    Enter text into the current input field, replacing its content. Once the keyboard is up, use Input directly instead of tapping keys.
do(action="Back")
    Go back one screen.
do(action="Home")
    Return to the home screen.
finish(message="xxx")
    The task is done.

[Rules]
- Output exactly one instruction!
- Tap a search box first, then use Input.
- If the screen did not change, adjust the coordinates instead of repeating the same operation.
"#;
