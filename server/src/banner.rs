//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Greeting sent to every new connection before any input is read

/// Banner text written on accept
pub const BANNER: &str = "
*********************************************************************
*                                                                   *
*    _____ _____ _     ____  ____  ____                             *
*   |_   _| ____| |   | __ )| __ )/ ___|                            *
*     | | |  _| | |   |  _ \\|  _ \\\\___ \\                            *
*     | | | |___| |___| |_) | |_) |___) |                           *
*     |_| |_____|_____|____/|____/|____/                            *
*                                                                   *
*********************************************************************
*                                                                   *
*                 Welcome to the Telbbs Telnet BBS!                 *
*                                                                   *
*                   To register, type 'register'.                   *
*                       To login, type 'login'.                     *
*                                                                   *
*********************************************************************
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_mentions_commands() {
        assert!(BANNER.contains("'register'"));
        assert!(BANNER.contains("'login'"));
        assert!(BANNER.ends_with('\n'));
    }
}
