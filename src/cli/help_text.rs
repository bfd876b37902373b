pub(super) const ROOT_LONG_ABOUT: &str = "\
Generate a configuration file from the fragments in a .d directory

Many programs read a single configuration file and have no notion of including other
files. dotdee lets you manage such a file (say ~/.ssh/config) as a directory of
fragments (~/.ssh/config.d/) and regenerates the file from them on demand.

CORE CONCEPTS:

  Fragment directory:
    For a file PATH the fragments live in PATH.d. Every regular file directly inside
    that directory whose name does not start with a dot is a fragment. Fragments are
    concatenated in natural order, so '2-work' comes before '10-extra'.

  Executable fragments:
    A fragment that is executable is run instead of read, and its standard output is
    used. If it exits with a non-zero status the whole update is aborted and the
    generated file is left alone.

  Migration:
    The first time you run 'dotdee update PATH' and PATH.d does not exist yet, the
    directory is created and the existing PATH is moved into it as PATH.d/local. No
    hand written content is lost.

  Change guard:
    After every write a SHA-256 fingerprint of the generated file is stored in
    PATH.d/.fingerprint. If the file was edited by hand (or deleted) since, the next
    update refuses to overwrite it until you pass --force.

TYPICAL WORKFLOW:

  1. Take over an existing file:
     $ dotdee update ~/.ssh/config

  2. Add a fragment:
     $ echo 'Host build' > ~/.ssh/config.d/50-build

  3. Check what would change:
     $ dotdee status ~/.ssh/config

  4. Regenerate:
     $ dotdee update ~/.ssh/config

COMMANDS:

  update
    Regenerate a file from its fragments, migrating it on first use.

  status
    Show the fragments, the guard state and whether an update would change the file.
    Exits with status 1 if the file is not up to date.

GLOBAL OPTIONS:

  -C <DIRECTORY>
    Change to directory before operating (like git -C or make -C).
    Relative file names are resolved from there.

  --host, --port, --user
    Manage a file on a remote host. Every operation runs over ssh in batch mode,
    so key based authentication must already work. File names must be absolute.

  --sudo
    Run every operation through 'sudo -n', locally or on the remote host.

CONFIGURATION:

  Defaults for the global options are read from TOML files, later files overriding
  earlier ones:

    /etc/dotdee.toml            /etc/dotdee.d/*.toml
    ~/.dotdee.toml              ~/.dotdee.d/*.toml
    ~/.config/dotdee.toml       ~/.config/dotdee.d/*.toml

  ~/.config is replaced by $XDG_CONFIG_HOME when set. Recognized keys are log_level,
  host, port, user and sudo. Use --config to read a single file instead, or
  --no-config to read none.

EXIT STATUS:

  0    Success (for status: the file is up to date)
  1    Refused to overwrite a modified file (for status: changes pending)
  2    An executable fragment failed
  255  Any other error

For detailed help on any command, use:
  dotdee <command> --help
";

pub(super) const UPDATE_LONG_ABOUT: &str = "\
Regenerate a file from its fragment directory

Renders all fragments in PATH.d in natural order and atomically replaces PATH with the
result. Each fragment contributes its content (or, if executable, its output) with
trailing line endings trimmed, followed by exactly one newline. An empty fragment
directory produces an empty file.

If PATH.d does not exist yet it is created. An existing PATH is moved to PATH.d/local
first, so the first update of a hand written file reproduces it unchanged.

If PATH already holds exactly the rendered content nothing is written.

LOCAL MODIFICATIONS (--force):

  The fingerprint stored in PATH.d/.fingerprint is compared against PATH before every
  write. If PATH was changed or deleted since it was last generated the update fails
  and PATH is left untouched. Move your edits into a fragment, then rerun with --force
  (or delete PATH.d/.fingerprint) to overwrite it.

FINGERPRINT VALIDATION (--fingerprint):

  Executable fragments may produce different output each time they run. To write
  exactly what you reviewed:

    1. Run 'dotdee status PATH' and review the output
    2. Run 'dotdee update PATH --fingerprint <FINGERPRINT>'

  If the rendered content differs from what status showed, the update fails without
  writing anything.

DRY RUN (--dry-run):

  Renders the file and checks for local modifications without changing anything.
  Not even the migration of a first-time PATH is performed. Executable fragments are
  still run.

EXAMPLES:

  # Regenerate a file
  $ dotdee update ~/.bashrc

  # Overwrite local edits
  $ dotdee update --force ~/.bashrc

  # Regenerate a file on a remote host as root
  $ dotdee --host web1 --sudo update /etc/hosts

  # Update with fingerprint validation
  $ FP=$(dotdee status /etc/hosts | grep '^Fingerprint:' | cut -d' ' -f2)
  $ dotdee update /etc/hosts --fingerprint $FP
";

pub(super) const STATUS_LONG_ABOUT: &str = "\
Show what an update would do

Lists the fragments of PATH in render order, whether PATH was modified since it was
last generated and whether regenerating it would change its content. Nothing is
written, but executable fragments are run since their output is part of the result.

The last line is the fingerprint of the rendered content, suitable for
'dotdee update --fingerprint'.

Exits with status 0 if PATH is up to date and 1 otherwise.

EXAMPLES:

  $ dotdee status ~/.ssh/config
  $ dotdee --host web1 status /etc/hosts
";
