//! Built-in instruction catalog
//!
//! Rules are scanned in declaration order and the first rule with a keyword
//! contained in the utterance wins, so a broad keyword placed early shadows
//! anything after it. Power-state rules sit ahead of the service rules
//! because "重启服务器" also contains "服务"; likewise "杀进程" precedes
//! "进程" and the login-log rules precede the generic "日志" rule. A bare
//! "重启" is not a power keyword: "重启nginx服务" restarts a service, not the
//! machine.

/// One keyword rule: keywords -> command template (or a clarification prompt)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub keywords: Vec<String>,
    /// `None` means the instruction needs more detail before it can run
    pub command: Option<String>,
    pub description: String,
}

impl Rule {
    pub fn new(keywords: &[&str], command: Option<&str>, description: &str) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            command: command.map(str::to_string),
            description: description.to_string(),
        }
    }

    /// First keyword of this rule contained in `utterance`
    pub fn matched_keyword(&self, utterance: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|k| utterance.contains(k.as_str()))
            .map(String::as_str)
    }
}

/// The default rule table, in priority order
pub fn default_rules() -> Vec<Rule> {
    vec![
        // System information
        Rule::new(&["磁盘", "硬盘", "存储空间", "disk space", "disk usage"], Some("df -h"), "Show disk usage"),
        Rule::new(&["内存", "memory usage"], Some("free -h"), "Show memory usage"),
        Rule::new(&["cpu使用", "cpu占用", "处理器", "cpu usage"], Some("top -bn1 | head -20"), "Show CPU usage"),
        Rule::new(
            &["系统信息", "系统版本", "操作系统", "system info"],
            Some("uname -a && cat /etc/os-release"),
            "Show system information",
        ),
        Rule::new(&["运行时间", "开机时间", "system uptime"], Some("uptime"), "Show system uptime"),
        Rule::new(&["负载", "system load"], Some("uptime && cat /proc/loadavg"), "Show system load"),
        // Power state and maintenance
        Rule::new(
            &["重启服务器", "重启机器", "重启系统", "reboot the server", "reboot server"],
            Some("sudo reboot"),
            "Reboot the server (requires confirmation)",
        ),
        Rule::new(
            &["关机", "关闭服务器", "shut down the server", "power off"],
            Some("sudo shutdown -h now"),
            "Shut down the server (requires confirmation)",
        ),
        Rule::new(
            &["更新系统", "系统更新", "update the system"],
            Some("sudo apt update && sudo apt upgrade -y"),
            "Update system packages",
        ),
        // Processes and services
        Rule::new(&["杀进程", "结束进程", "kill it", "kill a process"], None, "need a process name or PID"),
        Rule::new(
            &["进程", "process list", "running processes"],
            Some("ps aux --sort=-%mem | head -20"),
            "List processes by memory use",
        ),
        Rule::new(
            &["服务状态", "服务", "running services"],
            Some("systemctl list-units --type=service --state=running"),
            "List running services",
        ),
        // Network
        Rule::new(
            &["网络连接", "监听端口", "端口", "open ports", "listening ports"],
            Some("netstat -tulpn 2>/dev/null || ss -tulpn"),
            "Show network connections",
        ),
        Rule::new(&["ip地址", "网卡", "network interfaces"], Some("ip addr show"), "Show IP addresses"),
        Rule::new(&["路由", "routing table"], Some("ip route show"), "Show the routing table"),
        Rule::new(&["网络测试", "connectivity test"], None, "need a target address"),
        // Filesystem
        Rule::new(&["当前目录", "current directory"], Some("pwd"), "Show the current directory"),
        Rule::new(
            &["列出文件", "文件列表", "目录内容", "list files"],
            Some("ls -la"),
            "List files",
        ),
        Rule::new(&["文件大小", "目录大小", "folder size"], Some("du -sh *"), "Show file and directory sizes"),
        Rule::new(&["查看文件", "读取文件", "read file"], None, "need a file path"),
        // Logs
        Rule::new(&["登录日志", "登录记录", "login history"], Some("last -n 20"), "Show login history"),
        Rule::new(
            &["失败登录", "登录失败", "failed logins"],
            Some("lastb -n 20 2>/dev/null || echo 'root privileges required'"),
            "Show failed login attempts",
        ),
        Rule::new(
            &["系统日志", "日志", "system log"],
            Some("tail -n 50 /var/log/syslog 2>/dev/null || tail -n 50 /var/log/messages"),
            "Show the system log",
        ),
        // Users
        Rule::new(&["当前用户", "current user"], Some("whoami"), "Show the current user"),
        Rule::new(&["在线用户", "登录用户", "online users"], Some("who"), "Show logged-in users"),
        Rule::new(&["用户列表", "list users"], Some("cut -d: -f1 /etc/passwd"), "List all users"),
        // Docker
        Rule::new(
            &["docker容器", "容器列表", "list docker containers"],
            Some("docker ps -a"),
            "List Docker containers",
        ),
        Rule::new(&["docker镜像", "镜像列表", "list docker images"], Some("docker images"), "List Docker images"),
    ]
}

/// Keywords that short-circuit to the help text.
///
/// ASCII keywords must make up the whole utterance so "ls --help" still runs;
/// the CJK phrases match anywhere.
pub const HELP_KEYWORDS: &[&str] = &["帮助", "命令列表", "支持的命令", "help", "?"];

/// Substrings that mark a command as dangerous (compared lower-cased)
pub const DANGEROUS_PATTERNS: &[&str] = &[
    // power state
    "reboot",
    "shutdown",
    "poweroff",
    "halt",
    "init 0",
    "init 6",
    // destructive filesystem ops
    "rm -rf",
    "rm -fr",
    "mkfs",
    "wipefs",
    "chmod -r 777 /",
    // raw device writes
    "dd if=",
    "of=/dev/sd",
    "> /dev/sd",
    // fork bomb
    ":(){ :|:& };:",
    ":(){",
];

/// First words that identify a literal shell command
pub const KNOWN_COMMANDS: &[&str] = &[
    "ls", "cd", "pwd", "cat", "grep", "find", "ps", "top", "df", "du", "free", "uname", "whoami",
    "who", "id", "sudo", "apt", "yum", "dnf", "systemctl", "service", "docker", "kubectl", "git",
    "npm", "pip", "python", "node", "java", "mysql", "mongo", "redis", "nginx", "curl", "wget",
    "ssh", "scp", "rsync", "tar", "zip", "unzip", "chmod", "chown", "cp", "mv", "rm", "mkdir",
    "touch", "vim", "nano", "head", "tail", "less", "more", "echo", "date", "cal", "history",
    "netstat", "ss", "ip", "ifconfig", "ping", "traceroute", "nslookup", "kill", "killall",
    "pkill", "htop", "iotop", "iftop", "journalctl", "uptime", "last", "lsof", "dmesg",
];

/// Static help payload
pub const HELP_TEXT: &str = "\
Describe what you want in plain words, or type a shell command directly.

  System      查看磁盘空间 / 查看内存 / 查看CPU使用 / 系统信息 / 运行时间 / 系统负载
  Processes   查看进程 / 服务状态 / 杀进程 (asks for a name or PID)
  Network     网络连接 / 查看端口 / IP地址 / 路由表
  Files       当前目录 / 列出文件 / 文件大小
  Logs        系统日志 / 登录日志 / 失败登录
  Users       当前用户 / 在线用户 / 用户列表
  Docker      Docker容器 / Docker镜像
  Power       重启服务器 / 关机 / 更新系统  (dangerous, asks for confirmation)

English phrases such as \"disk space\", \"memory usage\" or \"open ports\" work too.";
