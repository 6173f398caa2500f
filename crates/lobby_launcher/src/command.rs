//! Command lines for the three ways the game gets launched.

/// A fully assembled launch command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl std::fmt::Display for GameCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// The configured launch parameters, fixed at startup.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub binary: String,
    pub sp_wad: String,
    pub sp_config: Option<String>,
    pub mp_wad: String,
    pub mp_map: String,
    pub mp_config: Option<String>,
    pub port: u16,
}

impl LaunchPlan {
    pub fn single_player(&self) -> GameCommand {
        let mut args = vec!["-iwad".to_string(), self.sp_wad.clone()];
        if let Some(cfg) = &self.sp_config {
            args.push("-config".to_string());
            args.push(cfg.clone());
        }
        GameCommand {
            program: self.binary.clone(),
            args,
        }
    }

    /// Host a deathmatch session for `players` participants (ourselves
    /// included) on the configured port.
    pub fn host(&self, players: usize) -> GameCommand {
        let mut args = vec![
            "-iwad".to_string(),
            self.mp_wad.clone(),
            "-deathmatch".to_string(),
            "+map".to_string(),
            self.mp_map.clone(),
            "-host".to_string(),
            players.to_string(),
            "-port".to_string(),
            self.port.to_string(),
        ];
        if let Some(cfg) = &self.mp_config {
            args.push("-config".to_string());
            args.push(cfg.clone());
        }
        GameCommand {
            program: self.binary.clone(),
            args,
        }
    }

    /// Join a remote host's session using the WAD it advertised.
    pub fn join(&self, hostname: &str, port: u16, wad: &str) -> GameCommand {
        let mut args = vec![
            "-iwad".to_string(),
            wad.to_string(),
            "-join".to_string(),
            hostname.to_string(),
            "-port".to_string(),
            port.to_string(),
        ];
        if let Some(cfg) = &self.mp_config {
            args.push("-config".to_string());
            args.push(cfg.clone());
        }
        GameCommand {
            program: self.binary.clone(),
            args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> LaunchPlan {
        LaunchPlan {
            binary: "zdoom".into(),
            sp_wad: "freedoom1.wad".into(),
            sp_config: None,
            mp_wad: "freedm.wad".into(),
            mp_map: "MAP01".into(),
            mp_config: Some("mp.ini".into()),
            port: 5029,
        }
    }

    #[test]
    fn single_player_args() {
        let cmd = plan().single_player();
        assert_eq!(cmd.program, "zdoom");
        assert_eq!(cmd.args, ["-iwad", "freedoom1.wad"]);

        let mut p = plan();
        p.sp_config = Some("sp.ini".into());
        assert_eq!(
            p.single_player().args,
            ["-iwad", "freedoom1.wad", "-config", "sp.ini"]
        );
    }

    #[test]
    fn host_args_carry_player_count_and_port() {
        let cmd = plan().host(3);
        assert_eq!(
            cmd.args,
            [
                "-iwad", "freedm.wad", "-deathmatch", "+map", "MAP01", "-host", "3", "-port",
                "5029", "-config", "mp.ini"
            ]
        );
    }

    #[test]
    fn join_uses_host_advertised_wad() {
        let cmd = plan().join("peer.local.", 6000, "other.wad");
        assert_eq!(
            cmd.args,
            ["-iwad", "other.wad", "-join", "peer.local.", "-port", "6000", "-config", "mp.ini"]
        );
    }
}
