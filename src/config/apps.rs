//! Display labels for common Android packages.
//!
//! `pm list packages` only reports package names, so the ADB app catalog
//! uses this table to give installed packages the labels a model would say.

use std::collections::BTreeSet;

use crate::device::InstalledApp;

/// Known `(label, package)` pairs. A package may carry several labels.
pub static KNOWN_APPS: &[(&str, &str)] = &[
    // Social & Messaging
    ("微信", "com.tencent.mm"),
    ("QQ", "com.tencent.mobileqq"),
    ("微博", "com.sina.weibo"),
    // E-commerce
    ("淘宝", "com.taobao.taobao"),
    ("京东", "com.jingdong.app.mall"),
    ("拼多多", "com.xunmeng.pinduoduo"),
    // Lifestyle & Social
    ("小红书", "com.xingin.xhs"),
    ("豆瓣", "com.douban.frodo"),
    ("知乎", "com.zhihu.android"),
    // Maps & Navigation
    ("高德地图", "com.autonavi.minimap"),
    ("百度地图", "com.baidu.BaiduMap"),
    // Food & Services
    ("美团", "com.sankuai.meituan"),
    ("大众点评", "com.dianping.v1"),
    ("饿了么", "me.ele"),
    // Travel
    ("携程", "ctrip.android.view"),
    ("铁路12306", "com.MobileTicket"),
    ("去哪儿旅行", "com.Qunar"),
    ("滴滴出行", "com.sdu.did.psnger"),
    // Video & Entertainment
    ("bilibili", "tv.danmaku.bili"),
    ("抖音", "com.ss.android.ugc.aweme"),
    ("快手", "com.smile.gifmaker"),
    ("腾讯视频", "com.tencent.qqlive"),
    ("爱奇艺", "com.qiyi.video"),
    // Music & Audio
    ("网易云音乐", "com.netease.cloudmusic"),
    ("QQ音乐", "com.tencent.qqmusic"),
    ("喜马拉雅", "com.ximalaya.ting.android"),
    // Productivity
    ("飞书", "com.ss.android.lark"),
    ("QQ邮箱", "com.tencent.androidqqmail"),
    ("豆包", "com.larus.nova"),
    // News
    ("今日头条", "com.ss.android.article.news"),
    // System
    ("设置", "com.android.settings"),
    ("Settings", "com.android.settings"),
    ("Chrome", "com.android.chrome"),
    ("Google Chrome", "com.android.chrome"),
    ("Clock", "com.android.deskclock"),
    ("Contacts", "com.android.contacts"),
    ("Files", "com.android.fileexplorer"),
    ("Gmail", "com.google.android.gm"),
    ("Google Maps", "com.google.android.apps.maps"),
    ("YouTube", "com.google.android.youtube"),
    ("Camera", "com.android.camera"),
    ("Gallery", "com.android.gallery3d"),
    ("Calculator", "com.android.calculator2"),
    ("Calendar", "com.android.calendar"),
    ("Messages", "com.android.mms"),
    ("Phone", "com.android.dialer"),
    ("Duolingo", "com.duolingo"),
    ("Booking.com", "com.booking"),
];

/// Get the first known label for a package.
pub fn label_for(package: &str) -> Option<&'static str> {
    KNOWN_APPS
        .iter()
        .find(|(_, pkg)| *pkg == package)
        .map(|(label, _)| *label)
}

/// Build the launcher catalog for a set of installed packages.
///
/// Known packages contribute one entry per label, in table order. Unknown
/// packages are listed under their package name so substring lookups on it
/// still work.
pub fn catalog_for(installed: &BTreeSet<String>) -> Vec<InstalledApp> {
    let mut apps: Vec<InstalledApp> = KNOWN_APPS
        .iter()
        .filter(|(_, package)| installed.contains(*package))
        .map(|(label, package)| InstalledApp {
            label: label.to_string(),
            package: package.to_string(),
        })
        .collect();

    apps.extend(
        installed
            .iter()
            .filter(|package| label_for(package).is_none())
            .map(|package| InstalledApp {
                label: package.clone(),
                package: package.clone(),
            }),
    );

    apps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_for() {
        assert_eq!(label_for("com.tencent.mm"), Some("微信"));
        assert_eq!(label_for("com.android.chrome"), Some("Chrome"));
        assert_eq!(label_for("org.example.none"), None);
    }

    #[test]
    fn test_catalog_for_installed_packages() {
        let installed: BTreeSet<String> = ["com.android.chrome", "org.example.notes"]
            .into_iter()
            .map(String::from)
            .collect();

        let apps = catalog_for(&installed);
        let labels: Vec<&str> = apps.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels, vec!["Chrome", "Google Chrome", "org.example.notes"]);
        assert!(apps.iter().all(|a| installed.contains(&a.package)));
    }
}
